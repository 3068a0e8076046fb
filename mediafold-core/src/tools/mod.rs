//! Adapters around external transformation tools.

pub mod ffmpeg;

use std::io;

use crate::error::PipelineError;

/// Map a spawn failure: a missing binary is a readiness problem, not an
/// I/O error.
pub(crate) fn spawn_error(program: &str, err: io::Error) -> PipelineError {
    if err.kind() == io::ErrorKind::NotFound {
        PipelineError::ToolUnavailable(program.to_string())
    } else {
        PipelineError::Io(err)
    }
}
