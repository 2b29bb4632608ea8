//! Observability for the coordinator.
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and name their fields
//! explicitly. Nonce values, identifiers, quota keys and the bearer secret are
//! never recorded in spans, logs or metric labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `coord_actions_total` | Counter | `action`, `outcome` | Executed actions |
//! | `coord_action_duration_seconds` | Histogram | `action` | Action latency inside the key-space actor |
//! | `coord_nonce_consume_total` | Counter | `outcome` | Replay checks that found / missed a nonce |
//! | `coord_ratelimit_decisions_total` | Counter | `decision` | Admissions and denials |
//! | `coord_expired_keys_swept_total` | Counter | none | Entries removed by the expiry sweep |
//! | `coord_keyspaces_active` | Gauge | none | Live key-space actors |
//! | `coord_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `coord_actor_panics_total` | Counter | `actor_type` | Actor tasks that died unexpectedly |
//! | `coord_messages_dropped_total` | Counter | `actor_type` | Messages refused by a full mailbox |
//! | `coord_auth_failures_total` | Counter | none | Rejected bearer credentials |

pub mod health;
pub mod metrics;

pub use health::HealthState;
pub use metrics::init_metrics_recorder;
