//! HTTP middleware for the coordinator.
//!
//! # Components
//!
//! - `auth` - Shared-secret bearer authentication for the action routes

pub mod auth;

pub use auth::{require_bearer, AuthState};
