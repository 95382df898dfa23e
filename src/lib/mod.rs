#[macro_use]
extern crate lazy_static;
extern crate tracing;

pub mod classifier;
pub mod cli;
pub mod error;
pub mod inference;
pub mod logger;
pub mod pipeline;
pub mod report;
pub mod settings;
pub mod source;
pub mod vision;
