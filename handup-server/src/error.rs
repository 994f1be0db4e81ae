//! Error taxonomy for the board API.
//!
//! Every fallible operation in the server funnels into [`ApiError`]; the
//! boundary conversion to an HTTP response lives here so handlers can
//! simply return `Result<_, ApiError>`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// All error kinds the API can surface, with their HTTP mappings.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),
    /// Missing, invalid, or expired credential (401).
    #[error("{0}")]
    Authentication(String),
    /// Authenticated but not permitted (403).
    #[error("{0}")]
    Authorization(String),
    /// Referenced task absent (404).
    #[error("Task not found")]
    NotFound,
    /// Operation not valid for the task's current status (400).
    #[error("{0}")]
    InvalidState(String),
    /// A requester tried to claim their own task (400).
    #[error("You cannot claim your own task")]
    SelfClaim,
    /// A concurrent writer changed the task between read and write (409).
    #[error("Task was modified concurrently, please retry")]
    Conflict,
    /// Unexpected failure (500).
    #[error("Server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status code this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidState(_) | Self::SelfClaim => {
                StatusCode::BAD_REQUEST
            }
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body for error responses: `{"success": false, "error": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
