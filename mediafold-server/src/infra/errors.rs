use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use mediafold_core::PipelineError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::SourceNotFound(_) => Self::not_found("File not found"),
            PipelineError::InvalidPath { .. } | PipelineError::Unsupported(_) => {
                Self::bad_request(err.to_string())
            }
            PipelineError::OutsideRoot(_) => Self::forbidden("Access denied"),
            PipelineError::ToolUnavailable(_) => Self::unavailable(err.to_string()),
            PipelineError::Timeout { .. } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, err.to_string())
            }
            PipelineError::ToolFailure { .. } => {
                tracing::warn!(error = %err, "transformation failed");
                Self::internal(err.to_string())
            }
            PipelineError::Io(io) => {
                tracing::error!(error = ?io, "filesystem operation failed");
                Self::internal("Filesystem operation failed")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_http_statuses() {
        let cases = [
            (PipelineError::SourceNotFound("a".into()), StatusCode::NOT_FOUND),
            (PipelineError::OutsideRoot("a".into()), StatusCode::FORBIDDEN),
            (
                PipelineError::ToolUnavailable("ffmpeg".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::InvalidPath {
                    path: "../x".into(),
                    reason: "parent directory segments are not allowed",
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
