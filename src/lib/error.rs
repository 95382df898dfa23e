use crate::inference::InferenceError;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Cannot extract the top {n} classes from an output of {output_len} values")]
    InvalidTopN { n: usize, output_len: usize },

    #[error("Label list has {labels} entries but the model produces {output_len} values")]
    LabelCountMismatch { labels: usize, output_len: usize },

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Authorization denied after {attempts} attempts")]
    AuthorizationDenied { attempts: u32 },

    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Pipeline channel closed unexpectedly")]
    ChannelClosed,

    #[error("Stage task panicked: {0}")]
    TaskPanicked(String),
}

impl PipelineError {
    /// Whether the failure only concerns the frame that produced it.
    /// Frame-local failures are logged and the stream carries on with the next frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::Decode(_)
                | Self::DimensionMismatch(_)
                | Self::Inference(_)
                | Self::TaskPanicked(_)
        )
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::TaskPanicked(error.to_string())
    }
}
