pub mod agent;
pub mod assembler;
pub mod clock;
pub mod gate;
pub mod grabber;
pub mod smoother;
pub mod stage;
pub mod stats;
pub mod token;
pub mod ui;

pub use assembler::{ClassifierPipeline, PipelineConfig, PipelineSummary};
pub use token::{MetaData, Token};
