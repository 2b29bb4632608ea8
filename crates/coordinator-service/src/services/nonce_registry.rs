//! Nonce registry: single-use values for replay-proof signature challenges.
//!
//! Entries live under `nonce:{identifier}` with expiry `now + ttl`. The
//! anti-replay guarantee of [`consume`] (at most one caller ever observes a
//! given value) comes from the read and the delete running inside one action
//! on the key-space actor that owns the storage.

use crate::storage::{read_json, write_json, Storage, StorageError};
use serde::Serialize;

/// Storage key prefix for nonces.
pub const NONCE_PREFIX: &str = "nonce:";

/// Minimum nonce TTL in seconds.
pub const MIN_TTL_SECONDS: i64 = 1;

/// Result of `nonce:set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceStored {
    /// Expiry instant in epoch seconds.
    pub expires_at: u64,
}

/// Result of `nonce:get` and `nonce:consume`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonceValue {
    /// Current value, or `None` when absent or expired.
    pub value: Option<String>,
}

fn nonce_key(identifier: &str) -> String {
    format!("{NONCE_PREFIX}{identifier}")
}

/// Store `value` under `identifier`, overwriting any previous value.
///
/// `ttl_seconds` is clamped to at least [`MIN_TTL_SECONDS`].
///
/// # Errors
///
/// Returns `StorageError` if the backend fails.
pub fn set(
    storage: &mut dyn Storage,
    now_ms: u64,
    identifier: &str,
    value: &str,
    ttl_seconds: i64,
) -> Result<NonceStored, StorageError> {
    // Clamped to >= 1, so the conversion cannot fail.
    let ttl = u64::try_from(ttl_seconds.max(MIN_TTL_SECONDS)).unwrap_or(1);
    let expires_at = (now_ms / 1000).saturating_add(ttl);

    write_json(storage, &nonce_key(identifier), &value, Some(expires_at))?;
    Ok(NonceStored { expires_at })
}

/// Read the current value without side effects.
///
/// # Errors
///
/// Returns `StorageError` if the backend fails or the stored value is not a string.
pub fn get(
    storage: &mut dyn Storage,
    now_ms: u64,
    identifier: &str,
) -> Result<NonceValue, StorageError> {
    let value = read_json::<String>(storage, &nonce_key(identifier), now_ms)?;
    Ok(NonceValue { value })
}

/// Read the current value and delete it in the same step.
///
/// # Errors
///
/// Returns `StorageError` if the backend fails or the stored value is not a string.
pub fn consume(
    storage: &mut dyn Storage,
    now_ms: u64,
    identifier: &str,
) -> Result<NonceValue, StorageError> {
    let key = nonce_key(identifier);
    let value = read_json::<String>(storage, &key, now_ms)?;
    if value.is_some() {
        storage.delete(&key)?;
    }
    Ok(NonceValue { value })
}
