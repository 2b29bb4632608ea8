//! Quota tracker: fixed-duration usage windows keyed by caller-chosen strings.
//!
//! Windows are stored under `quota:{key}`. The internal prefix keeps
//! [`reset_prefix`] confined to quota windows; results always carry the
//! caller's key without it.

use crate::errors::CoordinatorError;
use crate::storage::{read_json, write_json, Storage};
use serde::{Deserialize, Serialize};

/// Storage key prefix for quota windows.
pub const QUOTA_PREFIX: &str = "quota:";

/// A quota window as stored and as returned by `quota:ensure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaWindow {
    /// Usage ceiling for the window. Not enforced here.
    pub limit: u64,
    /// Units consumed so far; never decreases within a window.
    pub used: u64,
    /// Window length in seconds.
    pub duration: u64,
    /// Epoch second at which the window lapses.
    pub reset_at: u64,
}

/// Result of `quota:increment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    /// Units consumed after this increment.
    pub used: u64,
    /// `limit - used`, floored at zero.
    pub remaining: u64,
}

/// One entry of a `quota:incrementBatch` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyedQuotaUsage {
    /// Caller's key, without the storage prefix.
    pub key: String,
    pub used: u64,
    pub remaining: u64,
}

/// Result of `quota:incrementBatch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchUsage {
    /// One entry per request entry, in request order.
    pub results: Vec<KeyedQuotaUsage>,
}

/// Result of `quota:resetKeys` and `quota:resetPrefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Number of keys targeted, present or not.
    pub count: usize,
    /// The targeted keys, without the storage prefix.
    pub keys: Vec<String>,
}

/// A single `(key, amount)` increment request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncrementEntry {
    pub key: String,
    /// Rounded up and floored at zero before it is applied.
    pub amount: f64,
}

fn quota_key(key: &str) -> String {
    format!("{QUOTA_PREFIX}{key}")
}

/// `max(0, ceil(amount))` as an integer; NaN counts as zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn normalize_amount(amount: f64) -> u64 {
    // Non-negative after max; `as` saturates at u64::MAX.
    amount.ceil().max(0.0) as u64
}

fn load_live(
    storage: &mut dyn Storage,
    now_ms: u64,
    key: &str,
) -> Result<QuotaWindow, CoordinatorError> {
    read_json::<QuotaWindow>(storage, &quota_key(key), now_ms)?
        .filter(|window| window.reset_at > now_ms / 1000)
        .ok_or_else(|| CoordinatorError::NotInitialized(key.to_string()))
}

fn apply_increment(
    storage: &mut dyn Storage,
    key: &str,
    mut window: QuotaWindow,
    amount: f64,
) -> Result<QuotaUsage, CoordinatorError> {
    window.used = window.used.saturating_add(normalize_amount(amount));
    write_json(storage, &quota_key(key), &window, Some(window.reset_at))?;

    Ok(QuotaUsage {
        used: window.used,
        remaining: window.limit.saturating_sub(window.used),
    })
}

/// Return the live window for `key`, creating a fresh one if none exists or
/// the stored one has lapsed.
///
/// # Errors
///
/// Returns `CoordinatorError::Storage` if the backend fails.
pub fn ensure(
    storage: &mut dyn Storage,
    now_ms: u64,
    key: &str,
    limit: u64,
    duration_seconds: u64,
) -> Result<QuotaWindow, CoordinatorError> {
    let now_secs = now_ms / 1000;
    let storage_key = quota_key(key);

    if let Some(existing) = read_json::<QuotaWindow>(storage, &storage_key, now_ms)? {
        if existing.reset_at > now_secs {
            return Ok(existing);
        }
    }

    let window = QuotaWindow {
        limit,
        used: 0,
        duration: duration_seconds,
        reset_at: now_secs.saturating_add(duration_seconds),
    };
    write_json(storage, &storage_key, &window, Some(window.reset_at))?;
    Ok(window)
}

/// Add `max(0, ceil(amount))` to the live window for `key`.
///
/// Usage beyond `limit` is recorded; `remaining` bottoms out at zero.
///
/// # Errors
///
/// Returns `CoordinatorError::NotInitialized` if `key` has no live window,
/// or `CoordinatorError::Storage` if the backend fails.
pub fn increment(
    storage: &mut dyn Storage,
    now_ms: u64,
    key: &str,
    amount: f64,
) -> Result<QuotaUsage, CoordinatorError> {
    let window = load_live(storage, now_ms, key)?;
    apply_increment(storage, key, window, amount)
}

/// Apply several increments. Every key is checked before anything is
/// written, so a missing window leaves storage untouched.
///
/// A key listed more than once accumulates across its entries.
///
/// # Errors
///
/// Returns `CoordinatorError::NotInitialized` naming the first key without a
/// live window, or `CoordinatorError::Storage` if the backend fails.
pub fn increment_batch(
    storage: &mut dyn Storage,
    now_ms: u64,
    entries: &[IncrementEntry],
) -> Result<BatchUsage, CoordinatorError> {
    for entry in entries {
        load_live(storage, now_ms, &entry.key)?;
    }

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        // Re-read so repeated keys see earlier entries of this batch.
        let window = load_live(storage, now_ms, &entry.key)?;
        let usage = apply_increment(storage, &entry.key, window, entry.amount)?;
        results.push(KeyedQuotaUsage {
            key: entry.key.clone(),
            used: usage.used,
            remaining: usage.remaining,
        });
    }

    Ok(BatchUsage { results })
}

/// Delete each listed window outright. Absent keys are not an error.
///
/// # Errors
///
/// Returns `CoordinatorError::Storage` if the backend fails.
pub fn reset_keys(
    storage: &mut dyn Storage,
    keys: &[String],
) -> Result<ResetReport, CoordinatorError> {
    for key in keys {
        storage.delete(&quota_key(key))?;
    }

    Ok(ResetReport {
        count: keys.len(),
        keys: keys.to_vec(),
    })
}

/// Delete every live window whose key starts with `prefix`.
///
/// # Errors
///
/// Returns `CoordinatorError::Storage` if the backend fails.
pub fn reset_prefix(
    storage: &mut dyn Storage,
    now_ms: u64,
    prefix: &str,
) -> Result<ResetReport, CoordinatorError> {
    let storage_keys = storage.list_prefix(&quota_key(prefix), now_ms)?;

    let mut keys = Vec::with_capacity(storage_keys.len());
    for storage_key in storage_keys {
        storage.delete(&storage_key)?;
        if let Some(key) = storage_key.strip_prefix(QUOTA_PREFIX) {
            keys.push(key.to_string());
        }
    }

    Ok(ResetReport {
        count: keys.len(),
        keys,
    })
}
