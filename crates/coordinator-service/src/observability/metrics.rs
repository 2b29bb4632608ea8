//! Metrics definitions for the coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `coord_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `action`: 9 values (the action tags)
//! - `outcome`: ok, error
//! - `decision`: allowed, denied
//! - `actor_type`: coordinator, keyspace
//!
//! Key-space ids, identifiers and quota keys are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded. Action latency buckets are
/// tuned for in-memory read-modify-write work (sub-millisecond to 100ms).
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("coord_action_duration_seconds".to_string()),
            &[
                0.000_1, 0.000_5, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set action duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Action Metrics
// ============================================================================

/// Record one executed action.
///
/// Metrics: `coord_actions_total{action, outcome}`,
/// `coord_action_duration_seconds{action}`
pub fn record_action(action: &'static str, outcome: &'static str, duration: Duration) {
    counter!("coord_actions_total", "action" => action, "outcome" => outcome).increment(1);
    histogram!("coord_action_duration_seconds", "action" => action)
        .record(duration.as_secs_f64());
}

/// Record a `nonce:consume` result.
///
/// Metric: `coord_nonce_consume_total{outcome}` (hit, miss)
///
/// A high miss ratio means clients are replaying or racing on challenges.
pub fn record_nonce_consume(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!("coord_nonce_consume_total", "outcome" => outcome).increment(1);
}

/// Record a rate-limit decision.
///
/// Metric: `coord_ratelimit_decisions_total{decision}` (allowed, denied)
pub fn record_ratelimit_decision(allowed: bool) {
    let decision = if allowed { "allowed" } else { "denied" };
    counter!("coord_ratelimit_decisions_total", "decision" => decision).increment(1);
}

// ============================================================================
// Storage Metrics
// ============================================================================

/// Record entries removed by the periodic expiry sweep.
///
/// Metric: `coord_expired_keys_swept_total`
pub fn record_expired_swept(count: usize) {
    counter!("coord_expired_keys_swept_total").increment(u64::try_from(count).unwrap_or(u64::MAX));
}

// ============================================================================
// Actor Metrics
// ============================================================================

/// Set the number of live key-space actors.
///
/// Metric: `coord_keyspaces_active`
pub fn set_keyspaces_active(count: usize) {
    // usize to f64 conversion is safe for realistic key-space counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("coord_keyspaces_active").set(count as f64);
}

/// Adjust the aggregate mailbox depth for an actor type.
///
/// Metric: `coord_actor_mailbox_depth{actor_type}`
///
/// Every key-space actor reports into the same `keyspace` series, so depth is
/// tracked with increments rather than absolute sets.
pub fn adjust_actor_mailbox_depth(actor_type: &'static str, delta: f64) {
    gauge!("coord_actor_mailbox_depth", "actor_type" => actor_type).increment(delta);
}

/// Record an actor panic.
///
/// Metric: `coord_actor_panics_total{actor_type}`
///
/// ALERT: Any non-zero value indicates a bug.
pub fn record_actor_panic(actor_type: &'static str) {
    counter!("coord_actor_panics_total", "actor_type" => actor_type).increment(1);
}

/// Record a message rejected because an actor mailbox was full.
///
/// Metric: `coord_messages_dropped_total{actor_type}`
pub fn record_message_dropped(actor_type: &'static str) {
    counter!("coord_messages_dropped_total", "actor_type" => actor_type).increment(1);
}

// ============================================================================
// Front Door Metrics
// ============================================================================

/// Record a rejected bearer credential.
///
/// Metric: `coord_auth_failures_total`
pub fn record_auth_failure() {
    counter!("coord_auth_failures_total").increment(1);
}
