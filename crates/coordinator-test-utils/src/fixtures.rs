//! Action request bodies.
//!
//! Each builder returns the JSON object the front door expects, so tests read
//! as the sequence of actions they perform.

use serde_json::{json, Value};

pub fn nonce_set(identifier: &str, value: &str, ttl_seconds: i64) -> Value {
    json!({
        "action": "nonce:set",
        "identifier": identifier,
        "value": value,
        "ttlSeconds": ttl_seconds,
    })
}

pub fn nonce_get(identifier: &str) -> Value {
    json!({"action": "nonce:get", "identifier": identifier})
}

pub fn nonce_consume(identifier: &str) -> Value {
    json!({"action": "nonce:consume", "identifier": identifier})
}

pub fn ratelimit_check(limiter: &str, identifier: &str, limit: u64, window_seconds: u64) -> Value {
    json!({
        "action": "ratelimit:check",
        "limiter": limiter,
        "identifier": identifier,
        "limit": limit,
        "windowSeconds": window_seconds,
    })
}

pub fn quota_ensure(key: &str, limit: u64, duration_sec: u64) -> Value {
    json!({
        "action": "quota:ensure",
        "key": key,
        "limit": limit,
        "durationSec": duration_sec,
    })
}

pub fn quota_increment(key: &str, amount: f64) -> Value {
    json!({"action": "quota:increment", "key": key, "amount": amount})
}

/// `quota:incrementBatch` over `(key, amount)` pairs, in order.
pub fn quota_increment_batch(entries: &[(&str, f64)]) -> Value {
    let entries: Vec<Value> = entries
        .iter()
        .map(|(key, amount)| json!({"key": key, "amount": amount}))
        .collect();
    json!({"action": "quota:incrementBatch", "entries": entries})
}

pub fn quota_reset_keys(keys: &[&str]) -> Value {
    json!({"action": "quota:resetKeys", "keys": keys})
}

pub fn quota_reset_prefix(prefix: &str) -> Value {
    json!({"action": "quota:resetPrefix", "prefix": prefix})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_use_wire_field_names() {
        assert_eq!(nonce_set("n", "v", 5)["ttlSeconds"], 5);
        assert_eq!(ratelimit_check("l", "i", 3, 60)["windowSeconds"], 60);
        assert_eq!(quota_ensure("k", 10, 3600)["durationSec"], 3600);
    }

    #[test]
    fn test_batch_preserves_order() {
        let body = quota_increment_batch(&[("a", 1.0), ("b", 2.0)]);
        assert_eq!(body["entries"][0]["key"], "a");
        assert_eq!(body["entries"][1]["amount"], 2.0);
    }
}
