// ABOUTME: API error type and the mapping from core errors to HTTP responses
// ABOUTME: Validation-class messages pass through verbatim; internals stay generic

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json as ResponseJson, Response};
use serde_json::json;
use tracing::error;

use botdock_artifacts::ArtifactError;
use botdock_lifecycle::LifecycleError;
use botdock_sandbox::SandboxError;
use botdock_storage::StorageError;

/// An error ready to leave the API boundary
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Log the detail, answer with a generic message
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!("Internal error: {}", detail);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, ResponseJson(json!({"error": self.message}))).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(msg) => Self::bad_request(msg),
            LifecycleError::NotFound(msg) => Self::not_found(msg),
            LifecycleError::Forbidden(msg) => Self::forbidden(msg),
            LifecycleError::Conflict(msg) => Self::conflict(msg),
            LifecycleError::Runtime(e) => Self::bad_request(e.to_string()),
            LifecycleError::Artifact(ArtifactError::Validation(msg)) => Self::bad_request(msg),
            LifecycleError::Artifact(e) => Self::internal(e),
            LifecycleError::Sandbox(SandboxError::Connection(e)) => Self::internal(e),
            LifecycleError::Sandbox(e) => Self::bad_request(e.to_string()),
            LifecycleError::Storage(e) => Self::internal(e),
            LifecycleError::Internal(e) => Self::internal(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::internal(err)
    }
}
