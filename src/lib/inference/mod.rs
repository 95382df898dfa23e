pub mod synthetic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use synthetic::SyntheticEngine;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Input shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Spatial input dimensions expected by a model, three interleaved channels per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub width: u32,
    pub height: u32,
}

impl InputShape {
    pub fn tensor_len(&self) -> usize {
        3 * self.width as usize * self.height as usize
    }
}

/// Boundary to the component that actually runs the model.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    fn input_shape(&self) -> InputShape;

    /// Length of the score buffer returned by [`InferenceEngine::infer`].
    fn output_len(&self) -> usize;

    async fn infer(
        &self,
        input: Vec<f32>,
        width: u32,
        height: u32,
    ) -> Result<Vec<f32>, InferenceError>;
}
