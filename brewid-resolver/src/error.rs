//! Error types for brewid-resolver
//!
//! [`ResolverError`] is the engine taxonomy. [`ApiError`] maps it onto HTTP
//! status codes at the axum boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::EntityKey;

/// Engine error
///
/// Every variant leaves session state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolverError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Entity not found in session: {0}")]
    EntityNotFound(EntityKey),

    /// Malformed analysis batch
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Choice on a non-pending entity, or operation on a non-active session
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Commit attempted while entities remain pending
    #[error("Session incomplete: {outstanding} entities still pending")]
    IncompleteSession { outstanding: usize },

    /// Choice names a record that was not offered, or carries bad fields
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    /// AI or persistence collaborator failed; retry is the caller's call
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Cleanup guard protected in-progress human work
    #[error("Cleanup refused for reason '{reason}': {awaiting_human} entities await a human choice")]
    CleanupRefused { reason: String, awaiting_human: usize },
}

/// Result type for engine operations
pub type ResolverResult<T> = Result<T, ResolverError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict with current session state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Collaborator unavailable (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<ResolverError> for ApiError {
    fn from(err: ResolverError) -> Self {
        let message = err.to_string();
        match err {
            ResolverError::SessionNotFound(_) | ResolverError::EntityNotFound(_) => {
                ApiError::NotFound(message)
            }
            ResolverError::InvalidInput(_) | ResolverError::InvalidChoice(_) => {
                ApiError::BadRequest(message)
            }
            ResolverError::InvalidTransition(_)
            | ResolverError::IncompleteSession { .. }
            | ResolverError::CleanupRefused { .. } => ApiError::Conflict(message),
            ResolverError::UpstreamUnavailable(_) => ApiError::Unavailable(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
