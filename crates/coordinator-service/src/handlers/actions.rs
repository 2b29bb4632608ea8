//! Action endpoints.
//!
//! Both routes take the raw body, parse it into an [`Action`] and hand it to
//! the actor system. Everything after authentication is decided by the
//! key-space actor that owns the target key-space.

use crate::errors::CoordinatorError;
use crate::protocol::{Action, SuccessEnvelope};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::StatusCode,
    Json,
};
use common::types::KeySpaceId;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/actions
///
/// Executes against the configured default key-space.
#[instrument(skip_all, name = "coord.handlers.actions")]
pub async fn execute_default(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SuccessEnvelope>, CoordinatorError> {
    let body = body.map_err(body_rejection)?;
    execute(&state, state.default_keyspace.clone(), &body).await
}

/// Handler for POST /v1/keyspaces/:keyspace/actions
///
/// # Response
///
/// - 200 with `{"ok": true, "result": ...}` on success
/// - 400 if the key-space id is invalid or the body is not a valid action
/// - 404 if a quota increment targets an uninitialized window
/// - 413 if the body exceeds the configured limit
/// - 503 if the key-space cannot be admitted
#[instrument(skip_all, name = "coord.handlers.actions")]
pub async fn execute_in_keyspace(
    State(state): State<Arc<AppState>>,
    Path(keyspace): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SuccessEnvelope>, CoordinatorError> {
    let body = body.map_err(body_rejection)?;
    let keyspace = KeySpaceId::parse(keyspace)
        .map_err(|e| CoordinatorError::InvalidKeySpace(e.to_string()))?;

    execute(&state, keyspace, &body).await
}

/// Fallback for any non-POST method on the action routes.
///
/// Installed outside the bearer check, so a wrong method is reported as 405
/// whether or not the caller is authenticated.
pub async fn method_not_allowed() -> CoordinatorError {
    CoordinatorError::MethodNotAllowed
}

/// Map a body read failure onto the error envelope without axum's wording.
fn body_rejection(rejection: BytesRejection) -> CoordinatorError {
    tracing::debug!(
        target: "coord.handlers.actions",
        error = %rejection,
        "Request body rejected"
    );

    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        CoordinatorError::PayloadTooLarge
    } else {
        CoordinatorError::Malformed("Unreadable request body".to_string())
    }
}

async fn execute(
    state: &AppState,
    keyspace: KeySpaceId,
    body: &[u8],
) -> Result<Json<SuccessEnvelope>, CoordinatorError> {
    let action = Action::parse(body)?;
    let kind = action.kind();

    tracing::debug!(
        target: "coord.handlers.actions",
        keyspace = %keyspace,
        action = kind.as_str(),
        "Dispatching action"
    );

    let output = state.coordinator.execute(keyspace, action).await?;
    Ok(Json(SuccessEnvelope::new(output)))
}
