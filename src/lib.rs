pub mod algorithm;
pub mod artifacts;
pub mod cli;
pub mod common;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod post;
pub mod report;
pub mod sequence;
pub mod tools;

pub use error::{PipelineError, Result};
pub use pipeline::{run_pipeline, PipelineContext, PipelineOutput};
