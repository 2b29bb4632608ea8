//! Sliding-window rate limiter.
//!
//! Each `(limiter, identifier)` pair owns an ordered list of admitted request
//! timestamps under `rate:{limiter}:{identifier}`. A check prunes the list to
//! `[now - window, now]` before deciding, so admission at time T depends only
//! on requests inside the window ending at T. There are no aligned buckets and
//! therefore no burst at bucket boundaries.

use crate::storage::{read_json, write_json, Storage, StorageError};
use serde::Serialize;

/// Storage key prefix for rate windows.
pub const RATE_PREFIX: &str = "rate:";

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Whether this call was admitted.
    pub success: bool,
    /// Configured limit for the window.
    pub limit: u64,
    /// Calls still admissible in the current window.
    pub remaining: u64,
    /// Epoch millisecond at which the next slot frees up.
    pub reset: u64,
}

fn rate_key(limiter: &str, identifier: &str) -> String {
    format!("{RATE_PREFIX}{limiter}:{identifier}")
}

/// Check and, if admitted, record one call.
///
/// The stored list is rewritten with the pruned timestamps (plus `now` when
/// admitted). Its expiry is taken from the newest timestamp, so the list only
/// disappears once every entry has left the window. A denied call changes
/// nothing beyond the pruning.
///
/// # Errors
///
/// Returns `StorageError` if the backend fails or the stored list is corrupt.
pub fn check(
    storage: &mut dyn Storage,
    now_ms: u64,
    limiter: &str,
    identifier: &str,
    limit: u64,
    window_seconds: u64,
) -> Result<RateLimitDecision, StorageError> {
    let key = rate_key(limiter, identifier);
    let window_ms = window_seconds.saturating_mul(1000);
    let window_start = now_ms.saturating_sub(window_ms);

    let mut timestamps = read_json::<Vec<u64>>(storage, &key, now_ms)?.unwrap_or_default();
    timestamps.retain(|&ts| ts >= window_start);

    let count = u64::try_from(timestamps.len()).unwrap_or(u64::MAX);
    let success = count < limit;
    if success {
        timestamps.push(now_ms);
    }

    let oldest = timestamps.first().copied().unwrap_or(now_ms);
    let reset = oldest.saturating_add(window_ms);

    match timestamps.last().copied() {
        Some(newest) => {
            // Strictly after the newest entry's inclusive window edge.
            let expires_at = newest.saturating_add(window_ms) / 1000 + 1;
            write_json(storage, &key, &timestamps, Some(expires_at))?;
        }
        // Only reachable with limit == 0: nothing worth persisting.
        None => {
            storage.delete(&key)?;
        }
    }

    let remaining = if success {
        limit.saturating_sub(count + 1)
    } else {
        0
    };

    Ok(RateLimitDecision {
        success,
        limit,
        remaining,
        reset,
    })
}
