//! Storage layer: an ordered key/value store with per-key expiry.
//!
//! # Key Patterns
//!
//! - `nonce:{identifier}` - single-use nonce value (string)
//! - `rate:{limiter}:{identifier}` - sliding-window timestamps (array of ms)
//! - `quota:{key}` - quota window (object)
//!
//! # Serialization
//!
//! A [`Storage`] is owned by exactly one key-space actor and only reachable
//! through `&mut self`, so a group of calls made while handling one action
//! never interleaves with another caller. No locking happens below this trait.
//!
//! # Expiry
//!
//! A value whose `expires_at` has passed is treated as absent by every read.
//! Backends delete such entries lazily on `get` and eagerly in
//! [`Storage::sweep_expired`], which the owning actor runs on a timer.

mod memory;

pub use memory::MemoryStorage;

use common::types::KeySpaceId;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The backend itself failed.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A stored value with optional absolute expiry (epoch seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    /// Opaque value.
    pub value: serde_json::Value,
    /// Expiry instant in seconds since the epoch; `None` never expires.
    pub expires_at: Option<u64>,
}

impl StoredValue {
    /// Create a value with an optional expiry.
    #[must_use]
    pub fn new(value: serde_json::Value, expires_at: Option<u64>) -> Self {
        Self { value, expires_at }
    }

    /// Whether the value is unreadable at `now_ms`.
    ///
    /// A value expiring at second `S` is gone from millisecond `S * 1000` on.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now_ms >= expires_at.saturating_mul(1000))
    }
}

/// Key/value store with per-key expiry, owned by one key-space actor.
pub trait Storage: Send {
    /// Read a live value; expired entries read as `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the backend fails.
    fn get(&mut self, key: &str, now_ms: u64) -> Result<Option<serde_json::Value>, StorageError>;

    /// Insert or overwrite a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the backend fails.
    fn put(&mut self, key: &str, value: StoredValue) -> Result<(), StorageError>;

    /// Delete a key. Returns whether a live or expired entry was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the backend fails.
    fn delete(&mut self, key: &str) -> Result<bool, StorageError>;

    /// List live keys starting with `prefix`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the backend fails.
    fn list_prefix(&mut self, prefix: &str, now_ms: u64) -> Result<Vec<String>, StorageError>;

    /// Physically remove every expired entry. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the backend fails.
    fn sweep_expired(&mut self, now_ms: u64) -> Result<usize, StorageError>;

    /// Number of entries currently held, expired or not.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates the storage for a newly spawned key-space actor.
pub type StorageFactory = Arc<dyn Fn(&KeySpaceId) -> Box<dyn Storage> + Send + Sync>;

/// Factory producing a fresh [`MemoryStorage`] per key-space.
#[must_use]
pub fn memory_factory() -> StorageFactory {
    Arc::new(|_keyspace: &KeySpaceId| Box::new(MemoryStorage::new()) as Box<dyn Storage>)
}

/// Read and decode a typed value.
///
/// # Errors
///
/// Returns `StorageError::Codec` if the stored JSON does not decode as `T`.
pub fn read_json<T: DeserializeOwned>(
    storage: &mut dyn Storage,
    key: &str,
    now_ms: u64,
) -> Result<Option<T>, StorageError> {
    storage
        .get(key, now_ms)?
        .map(|value| {
            serde_json::from_value(value).map_err(|e| StorageError::Codec(format!("{key}: {e}")))
        })
        .transpose()
}

/// Encode and write a typed value.
///
/// # Errors
///
/// Returns `StorageError::Codec` if `value` cannot be encoded.
pub fn write_json<T: Serialize>(
    storage: &mut dyn Storage,
    key: &str,
    value: &T,
    expires_at: Option<u64>,
) -> Result<(), StorageError> {
    let value =
        serde_json::to_value(value).map_err(|e| StorageError::Codec(format!("{key}: {e}")))?;
    storage.put(key, StoredValue::new(value, expires_at))
}
