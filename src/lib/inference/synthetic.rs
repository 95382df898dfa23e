use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tracing::*;

use super::{InferenceEngine, InferenceError, InputShape};

/// Deterministic stand-in for a real model.
///
/// Each class is scored from a fixed slice of the input tensor and the scores
/// are turned into probabilities with a softmax. The engine can simulate a
/// slow accelerator and transient failures.
#[derive(Debug)]
pub struct SyntheticEngine {
    shape: InputShape,
    classes: usize,
    latency: Duration,
    fail_every: Option<u64>,
    calls: AtomicU64,
}

impl SyntheticEngine {
    pub fn new(shape: InputShape, classes: usize) -> Self {
        Self {
            shape,
            classes: classes.max(1),
            latency: Duration::ZERO,
            fail_every: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every `period`-th call fails with [`InferenceError::Unavailable`].
    pub fn with_failure_every(mut self, period: u64) -> Self {
        self.fail_every = (period > 0).then_some(period);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn scores(&self, input: &[f32]) -> Vec<f32> {
        let chunk = input.len().div_ceil(self.classes).max(1);
        let logits: Vec<f32> = (0..self.classes)
            .map(|class| {
                let slice = input.chunks(chunk).nth(class).unwrap_or_default();
                if slice.is_empty() {
                    return 0.0;
                }
                slice.iter().sum::<f32>() / slice.len() as f32
            })
            .collect();

        softmax(&logits)
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exponentials: Vec<f32> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let sum: f32 = exponentials.iter().sum();

    exponentials.into_iter().map(|value| value / sum).collect()
}

#[async_trait]
impl InferenceEngine for SyntheticEngine {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn output_len(&self) -> usize {
        self.classes
    }

    #[instrument(level = "trace", skip(self, input))]
    async fn infer(
        &self,
        input: Vec<f32>,
        width: u32,
        height: u32,
    ) -> Result<Vec<f32>, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;

        let expected = InputShape { width, height }.tensor_len();
        if (width, height) != (self.shape.width, self.shape.height) || input.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected: self.shape.tensor_len(),
                actual: input.len(),
            });
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(period) = self.fail_every {
            if call % period == 0 {
                return Err(InferenceError::Unavailable(format!(
                    "simulated failure on call {call}"
                )));
            }
        }

        Ok(self.scores(&input))
    }
}
