//! Pipeline error taxonomy
//!
//! Every variant is fatal for the dataset being processed. There is no
//! continue-on-error mode: a run either produces complete membership tables
//! for a threshold or reports why it could not.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid thresholds or conflicting options, detected before any tool runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required external tool is not on PATH.
    #[error("required tool '{tool}' not found on PATH ({needed_for})")]
    Dependency { tool: String, needed_for: String },

    /// An external tool exited unsuccessfully. The log is kept for diagnosis.
    #[error("{tool} failed ({status}); see log {}", .log.display())]
    ExternalTool {
        tool: String,
        status: String,
        log: PathBuf,
    },

    /// Locus-count or containment check failed.
    #[error("invariant violated at {stage}: {detail} (expected {expected}, found {found})")]
    Invariant {
        stage: String,
        detail: String,
        expected: usize,
        found: usize,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub fn invariant(
        stage: impl Into<String>,
        detail: impl Into<String>,
        expected: usize,
        found: usize,
    ) -> Self {
        PipelineError::Invariant {
            stage: stage.into(),
            detail: detail.into(),
            expected,
            found,
        }
    }

    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        PipelineError::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn tool_failed(tool: &str, status: ExitStatus, log: PathBuf) -> Self {
        let status = match status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        PipelineError::ExternalTool {
            tool: tool.to_string(),
            status,
            log,
        }
    }

    /// True for errors that indicate corrupt intermediate state rather than
    /// bad input or a broken environment.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, PipelineError::Invariant { .. })
    }
}
