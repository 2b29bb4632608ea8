//! Coordinator error types.
//!
//! Every failure surfaced to a caller is rendered as the `{ok:false, error}`
//! envelope. Storage and internal failures are logged server-side with their
//! detail but reach the client only as a fixed message.

use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Coordinator error type.
///
/// Maps to HTTP status codes:
/// - `Malformed`, `UnsupportedAction`, `InvalidKeySpace`: 400
/// - `Unauthorized`: 401
/// - `NotInitialized`: 404
/// - `MethodNotAllowed`: 405
/// - `Timeout`: 408
/// - `PayloadTooLarge`: 413
/// - `CapacityExceeded`: 503
/// - `Storage`, `Internal`: 500
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Unparsable body, missing or mistyped field, or a value out of range.
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// The `action` tag is not one this coordinator understands.
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// The key-space id in the request path is invalid.
    #[error("Invalid key-space: {0}")]
    InvalidKeySpace(String),

    /// `quota:increment` against a key with no live window.
    #[error("Quota window not initialized: {0}")]
    NotInitialized(String),

    /// Bearer credential missing or mismatched.
    #[error("Unauthorized")]
    Unauthorized,

    /// Front door received something other than POST.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request body exceeded the configured limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// The key-space limit has been reached.
    #[error("Coordinator at capacity")]
    CapacityExceeded,

    /// Storage layer failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (actor channel failures, draining, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoordinatorError::Malformed(_)
            | CoordinatorError::UnsupportedAction(_)
            | CoordinatorError::InvalidKeySpace(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoordinatorError::NotInitialized(_) => StatusCode::NOT_FOUND,
            CoordinatorError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            CoordinatorError::Timeout => StatusCode::REQUEST_TIMEOUT,
            CoordinatorError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            CoordinatorError::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
            CoordinatorError::Storage(_) | CoordinatorError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the message placed in the response envelope.
    ///
    /// Client-caused errors carry their detail; server-side failures do not.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            CoordinatorError::Malformed(detail) | CoordinatorError::InvalidKeySpace(detail) => {
                detail.clone()
            }
            CoordinatorError::Storage(_) | CoordinatorError::Internal(_) => {
                "Internal error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Bounded label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::Malformed(_) => "malformed",
            CoordinatorError::UnsupportedAction(_) => "unsupported_action",
            CoordinatorError::InvalidKeySpace(_) => "invalid_keyspace",
            CoordinatorError::NotInitialized(_) => "not_initialized",
            CoordinatorError::Unauthorized => "unauthorized",
            CoordinatorError::MethodNotAllowed => "method_not_allowed",
            CoordinatorError::Timeout => "timeout",
            CoordinatorError::PayloadTooLarge => "payload_too_large",
            CoordinatorError::CapacityExceeded => "capacity_exceeded",
            CoordinatorError::Storage(_) => "storage",
            CoordinatorError::Internal(_) => "internal",
        }
    }
}

impl From<StorageError> for CoordinatorError {
    fn from(err: StorageError) -> Self {
        CoordinatorError::Storage(err.to_string())
    }
}

/// Failure envelope: `{"ok": false, "error": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: String,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                target: "coord.errors",
                error = %self,
                status = status.as_u16(),
                "Request failed with server error"
            );
        }

        let body = ErrorEnvelope {
            ok: false,
            error: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}
