//! Gatehouse State Coordinator Library
//!
//! Authoritative, strongly consistent state for an edge authentication
//! gateway:
//!
//! - Single-use nonces with expiry (replay protection)
//! - Sliding-window rate limits
//! - Fixed-window usage quotas
//!
//! # Architecture
//!
//! ```text
//! HTTP front door (Axum, bearer auth)
//! └── CoordinatorActor (singleton)
//!     └── KeySpaceActor (one per key-space)
//!         └── Storage (exclusively owned)
//! ```
//!
//! Every action against a key-space is executed by that key-space's actor,
//! one at a time, so each read-modify-write sequence is atomic with respect
//! to every other action on the same key-space.
//!
//! # Modules
//!
//! - [`actors`] - Supervisor and key-space actors
//! - [`protocol`] - Action parsing, validation and result shapes
//! - [`services`] - Nonce, rate-limit and quota logic over a storage
//! - [`storage`] - Key/value storage with per-key expiry
//! - [`routes`] - Axum router and application state
//! - [`config`] - Service configuration from environment

#![warn(clippy::pedantic)]

pub mod actors;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod storage;
