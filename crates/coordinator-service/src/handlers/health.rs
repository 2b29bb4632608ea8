//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that the actor system answers and is
//!   not draining

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness probe response body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Live key-space actors, when the actor system answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspaces: Option<usize>,

    /// Generic reason, when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl ReadinessResponse {
    fn not_ready(keyspaces: Option<usize>, error: &'static str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Self {
                status: "not_ready",
                keyspaces,
                error: Some(error),
            }),
        )
    }
}

/// Liveness probe handler.
///
/// Does not check any dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if ready, 503 if not ready.
///
/// ## Checks
///
/// 1. Startup has completed and shutdown has not begun
/// 2. The coordinator actor answers a status query
/// 3. The coordinator is not draining
#[tracing::instrument(skip_all, name = "coord.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.health.is_ready() {
        tracing::debug!(
            target: "coord.health",
            "Readiness check failed: not started or shutting down"
        );
        return ReadinessResponse::not_ready(None, "Service not ready");
    }

    let status = match state.coordinator.status().await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(
                target: "coord.health",
                error = %e,
                "Readiness check failed: actor system unreachable"
            );
            return ReadinessResponse::not_ready(None, "Service dependencies unavailable");
        }
    };

    if status.is_draining {
        return ReadinessResponse::not_ready(Some(status.keyspace_count), "Service draining");
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            keyspaces: Some(status.keyspace_count),
            error: None,
        }),
    )
}
