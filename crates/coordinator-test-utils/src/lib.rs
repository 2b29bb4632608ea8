//! # Coordinator Test Utilities
//!
//! Shared test utilities for the coordinator service.
//!
//! This crate provides:
//! - Server test harness (`TestCoordinatorServer` for E2E tests)
//! - Action body builders (`fixtures`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coordinator_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestCoordinatorServer::spawn().await?;
//!
//!     let response = server
//!         .post_action(&fixtures::nonce_get("n-1"))
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
