//! HTTP routes for the coordinator.
//!
//! Defines the Axum router and application state.

use crate::actors::CoordinatorHandle;
use crate::config::Config;
use crate::errors::CoordinatorError;
use crate::handlers;
use crate::middleware::{require_bearer, AuthState};
use crate::observability::HealthState;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use common::types::KeySpaceId;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the actor system.
    pub coordinator: CoordinatorHandle,

    /// Key-space served by `POST /v1/actions`.
    pub default_keyspace: KeySpaceId,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,

    /// Bearer verification state.
    pub auth: Arc<AuthState>,

    pub request_timeout: Duration,

    pub max_body_bytes: usize,
}

impl AppState {
    /// Build the state from configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::Internal` if the bearer verification key
    /// cannot be generated.
    pub fn new(
        config: &Config,
        coordinator: CoordinatorHandle,
        health: Arc<HealthState>,
    ) -> Result<Self, CoordinatorError> {
        Ok(Self {
            coordinator,
            default_keyspace: config.default_keyspace.clone(),
            health,
            auth: Arc::new(AuthState::new(&config.auth_secret)?),
            request_timeout: config.request_timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (checks the actor system) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/v1/actions` - Execute against the default key-space - bearer auth
/// - `/v1/keyspaces/:keyspace/actions` - Execute against a named key-space -
///   bearer auth
/// - TraceLayer for request logging
/// - Request timeout and body size limit
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_layer = middleware::from_fn_with_state(Arc::clone(&state.auth), require_bearer);
    let request_timeout = state.request_timeout;
    let max_body_bytes = state.max_body_bytes;

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(Arc::clone(&state));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Action routes. The bearer check is a route layer on the POST handler
    // only, so the method fallback answers 405 before authentication.
    let action_routes = Router::new()
        .route(
            "/v1/actions",
            post(handlers::execute_default)
                .route_layer(auth_layer.clone())
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/keyspaces/:keyspace/actions",
            post(handlers::execute_in_keyspace)
                .route_layer(auth_layer)
                .fallback(handlers::method_not_allowed),
        )
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. DefaultBodyLimit - Cap the body read by the `Bytes` extractor
    // 2. TimeoutLayer - Timeout the request
    // 3. envelope_timeout - Render the timeout as an error envelope
    // 4. TraceLayer - Log request details (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(action_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::map_response(envelope_timeout))
        .layer(TraceLayer::new_for_http())
}

/// `TimeoutLayer` answers with a bare 408; give it the usual failure body.
#[allow(clippy::unused_async)]
async fn envelope_timeout(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        CoordinatorError::Timeout.into_response()
    } else {
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::{ActorMetrics, CoordinatorSettings};
    use crate::clock::ManualClock;
    use crate::storage::memory_factory;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    const SECRET: &str = "router-secret";

    fn test_state() -> Arc<AppState> {
        let config = Config::from_vars(&HashMap::from([(
            "COORDINATOR_AUTH_SECRET".to_string(),
            SECRET.to_string(),
        )]))
        .unwrap();
        let coordinator = CoordinatorHandle::new(
            CoordinatorSettings::default(),
            memory_factory(),
            ManualClock::shared(1_700_000_000_000),
            ActorMetrics::new(),
        );
        let health = Arc::new(HealthState::new());
        health.set_ready();
        Arc::new(AppState::new(&config, coordinator, health).unwrap())
    }

    fn test_app(state: Arc<AppState>) -> Router {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        build_routes(state, handle)
    }

    fn post_action(uri: &str, body: &Value, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(secret) = bearer {
            builder = builder.header("authorization", format!("Bearer {secret}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = test_app(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_ready_reflects_health_state() {
        let state = test_state();

        let response = test_app(Arc::clone(&state))
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ready");

        state.health.set_not_ready();
        let response = test_app(state)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "not_ready");
    }

    #[tokio::test]
    async fn test_ready_is_unavailable_after_shutdown() {
        let state = test_state();
        state
            .coordinator
            .shutdown(Duration::from_secs(1))
            .await
            .unwrap();

        let response = test_app(state)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_action_round_trip() {
        let state = test_state();
        let body = json!({"action": "nonce:set", "identifier": "n-1", "value": "v", "ttlSeconds": 60});

        let response = test_app(Arc::clone(&state))
            .oneshot(post_action("/v1/actions", &body, Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["result"]["expiresAt"], 1_700_000_060_u64);

        let consume = json!({"action": "nonce:consume", "identifier": "n-1"});
        let response = test_app(state)
            .oneshot(post_action("/v1/actions", &consume, Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["result"]["value"], "v");
    }

    #[tokio::test]
    async fn test_missing_bearer_is_unauthorized() {
        let body = json!({"action": "nonce:get", "identifier": "n-1"});
        let response = test_app(test_state())
            .oneshot(post_action("/v1/actions", &body, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json, json!({"ok": false, "error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn test_wrong_method_is_405_without_auth() {
        for method in ["GET", "PUT", "DELETE"] {
            let response = test_app(test_state())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/v1/keyspaces/tenant-a/actions")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            let json = json_body(response).await;
            assert_eq!(json, json!({"ok": false, "error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn test_invalid_keyspace_is_bad_request() {
        let body = json!({"action": "nonce:get", "identifier": "n-1"});
        let response = test_app(test_state())
            .oneshot(post_action("/v1/keyspaces/bad%20id/actions", &body, Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["ok"], false);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = test_app(test_state())
            .oneshot(
                Request::post("/v1/actions")
                    .header("authorization", format!("Bearer {SECRET}"))
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let state = test_state();
        let padding = "x".repeat(state.max_body_bytes + 1);
        let body = json!({"action": "nonce:get", "identifier": padding});

        let response = test_app(state)
            .oneshot(post_action("/v1/actions", &body, Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            json_body(response).await,
            json!({"ok": false, "error": "Request body too large"})
        );
    }

    #[tokio::test]
    async fn test_timeout_renders_error_envelope() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(TimeoutLayer::new(Duration::from_millis(20)))
            .layer(middleware::map_response(envelope_timeout));

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            json_body(response).await,
            json!({"ok": false, "error": "Request timed out"})
        );
    }

    #[tokio::test]
    async fn test_non_timeout_responses_pass_through() {
        let response = envelope_timeout(StatusCode::NO_CONTENT.into_response()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_is_public() {
        let response = test_app(test_state())
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
