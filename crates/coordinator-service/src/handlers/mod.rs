//! HTTP request handlers for the coordinator.

pub mod actions;
pub mod health;
pub mod metrics;

pub use actions::{execute_default, execute_in_keyspace, method_not_allowed};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
