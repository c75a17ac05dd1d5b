//! Error definitions shared by the store, the client cache and the endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors that can occur while reading or changing sharing settings.
#[derive(Debug, Error)]
pub enum SharingError {
    /// Malformed input to a direct mutation (bad management value, empty slug).
    #[error("validation error: {0}")]
    Validation(String),

    /// A guard condition did not hold; nothing was changed.
    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    /// The settings endpoint could not be reached or answered with an error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The option storage failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for sharing settings operations.
pub type SharingResult<T> = Result<T, SharingError>;

impl SharingError {
    /// Stable machine-readable code, used in endpoint error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SharingError::Validation(_) => "invalid_param",
            SharingError::Precondition(_) => "precondition_failed",
            SharingError::Transport(_) => "transport_error",
            SharingError::Storage(_) => "storage_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            SharingError::Validation(_) => StatusCode::BAD_REQUEST,
            SharingError::Precondition(_) => StatusCode::CONFLICT,
            SharingError::Transport(_) => StatusCode::BAD_GATEWAY,
            SharingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for SharingError {
    fn from(err: reqwest::Error) -> Self {
        SharingError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for SharingError {
    fn from(err: std::io::Error) -> Self {
        SharingError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SharingError {
    fn from(err: serde_json::Error) -> Self {
        SharingError::Storage(err.to_string())
    }
}

impl IntoResponse for SharingError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
