//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bouncer_source::SourceError;

/// API error type.
///
/// Responses are plain text: the protocol's clients speak a line-oriented
/// byte format, not JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("core error: {0}")]
    Core(#[from] bouncer_core::Error),

    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Core(_) => "core_error",
            Self::Source(_) => "source_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Core errors reaching the boundary are malformed client input.
            Self::Core(_) => StatusCode::BAD_REQUEST,
            // Origin trouble surfacing here means the server could not come
            // up with an answer, never the client's fault.
            Self::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
