//! Prometheus metrics endpoint handler.
//!
//! The endpoint is unauthenticated so Prometheus can scrape it. Metric labels
//! are bounded and carry no caller data.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE coord_actions_total counter
/// coord_actions_total{action="nonce:consume",outcome="ok"} 42
/// ```
#[tracing::instrument(skip_all, name = "coord.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
