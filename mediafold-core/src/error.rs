use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Failures of a single derivative job or streaming session.
///
/// Pool saturation is not represented here: the dispatcher waits on the
/// worker semaphore instead of failing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source vanished between enqueue and processing, or never existed.
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("invalid source path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// The path resolves (through a symlink) outside the media root.
    #[error("source '{0}' resolves outside the media root")]
    OutsideRoot(String),

    /// The external tool exited non-zero or produced no output.
    #[error("{tool} failed: {message}")]
    ToolFailure { tool: String, message: String },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("external tool '{0}' is not available")]
    ToolUnavailable(String),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn tool_failure(
        tool: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Failures that should be retried at an alternate seek point.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ToolFailure { .. } | Self::Timeout { .. })
    }
}
