//! Error taxonomy for test execution and validation.
//!
//! Filesystem and process errors propagate to the orchestrator, which always
//! cleans the workspace before handing them to the caller. A malformed
//! validator verdict is not an error; it becomes an invalid
//! [`crate::model::ValidationResult`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("workspace i/o failed at {path}: {source}")]
    WorkspaceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run `{program}`: {source}")]
    ProcessFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {}s and was killed", timeout.as_secs_f64())]
    ProcessTimeout {
        program: String,
        timeout: Duration,
        /// Lines the process printed before it was killed.
        output: String,
    },

    #[error("coverage report not found at: {}", path.display())]
    MissingReport { path: PathBuf },

    #[error("coverage report at {} is malformed: {source}", path.display())]
    MalformedReport {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl RunError {
    pub fn workspace_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WorkspaceIo {
            path: path.into(),
            source,
        }
    }

    pub fn process_failure(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::ProcessFailure {
            program: program.into(),
            source,
        }
    }

    /// Stable machine-readable code. Downstream tooling branches on this,
    /// never on the display message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkspaceIo { .. } => "workspace_io",
            Self::ProcessFailure { .. } => "process_failure",
            Self::ProcessTimeout { .. } => "process_timeout",
            Self::MissingReport { .. } => "missing_report",
            Self::MalformedReport { .. } => "malformed_report",
            Self::Config(_) => "config",
        }
    }

    /// True for errors that come from the environment (disk, subprocess,
    /// report) rather than from user configuration.
    pub fn is_infra(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Output the failing process produced before it was stopped, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::ProcessTimeout { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

/// A failed execution together with whatever output the external tool had
/// produced before the failure surfaced.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    #[source]
    pub error: RunError,
    pub raw_output: Option<String>,
}

impl ExecutionFailure {
    pub fn new(error: RunError) -> Self {
        let raw_output = error.captured_output().map(str::to_owned);
        Self { error, raw_output }
    }

    pub fn with_output(mut self, raw_output: impl Into<String>) -> Self {
        self.raw_output = Some(raw_output.into());
        self
    }
}

impl From<RunError> for ExecutionFailure {
    fn from(error: RunError) -> Self {
        Self::new(error)
    }
}
