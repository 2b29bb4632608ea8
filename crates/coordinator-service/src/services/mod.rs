//! Coordination primitives.
//!
//! Each module is a set of free functions over `&mut dyn Storage`. They carry
//! no state of their own; serialization comes from the key-space actor that
//! owns the storage and calls them one action at a time.

pub mod nonce_registry;
pub mod quota_tracker;
pub mod rate_limiter;
