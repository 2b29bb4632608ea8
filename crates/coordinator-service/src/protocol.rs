//! Action protocol.
//!
//! A request body is one JSON object tagged by its `action` field:
//!
//! ```json
//! {"action": "ratelimit:check", "limiter": "login", "identifier": "1.2.3.4",
//!  "limit": 5, "windowSeconds": 60}
//! ```
//!
//! Parsing yields a closed [`Action`]; executing one against a storage yields
//! an [`ActionOutput`], wrapped on the wire as `{"ok": true, "result": ...}`.

use crate::errors::CoordinatorError;
use crate::services::nonce_registry::{self, NonceStored, NonceValue};
use crate::services::quota_tracker::{
    self, BatchUsage, IncrementEntry, QuotaUsage, QuotaWindow, ResetReport,
};
use crate::services::rate_limiter::{self, RateLimitDecision};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};

/// The nine action tags, used for routing checks and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    NonceSet,
    NonceGet,
    NonceConsume,
    RateLimitCheck,
    QuotaEnsure,
    QuotaIncrement,
    QuotaIncrementBatch,
    QuotaResetKeys,
    QuotaResetPrefix,
}

impl ActionKind {
    /// Look up a wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "nonce:set" => Some(Self::NonceSet),
            "nonce:get" => Some(Self::NonceGet),
            "nonce:consume" => Some(Self::NonceConsume),
            "ratelimit:check" => Some(Self::RateLimitCheck),
            "quota:ensure" => Some(Self::QuotaEnsure),
            "quota:increment" => Some(Self::QuotaIncrement),
            "quota:incrementBatch" => Some(Self::QuotaIncrementBatch),
            "quota:resetKeys" => Some(Self::QuotaResetKeys),
            "quota:resetPrefix" => Some(Self::QuotaResetPrefix),
            _ => None,
        }
    }

    /// Wire tag, also the bounded metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NonceSet => "nonce:set",
            Self::NonceGet => "nonce:get",
            Self::NonceConsume => "nonce:consume",
            Self::RateLimitCheck => "ratelimit:check",
            Self::QuotaEnsure => "quota:ensure",
            Self::QuotaIncrement => "quota:increment",
            Self::QuotaIncrementBatch => "quota:incrementBatch",
            Self::QuotaResetKeys => "quota:resetKeys",
            Self::QuotaResetPrefix => "quota:resetPrefix",
        }
    }
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "nonce:set", rename_all = "camelCase")]
    NonceSet {
        identifier: String,
        value: String,
        ttl_seconds: i64,
    },

    #[serde(rename = "nonce:get")]
    NonceGet { identifier: String },

    #[serde(rename = "nonce:consume")]
    NonceConsume { identifier: String },

    #[serde(rename = "ratelimit:check", rename_all = "camelCase")]
    RateLimitCheck {
        limiter: String,
        identifier: String,
        limit: u64,
        window_seconds: u64,
    },

    #[serde(rename = "quota:ensure", rename_all = "camelCase")]
    QuotaEnsure {
        key: String,
        limit: u64,
        duration_sec: u64,
    },

    #[serde(rename = "quota:increment")]
    QuotaIncrement { key: String, amount: f64 },

    #[serde(rename = "quota:incrementBatch")]
    QuotaIncrementBatch { entries: Vec<IncrementEntry> },

    #[serde(rename = "quota:resetKeys")]
    QuotaResetKeys { keys: Vec<String> },

    #[serde(rename = "quota:resetPrefix")]
    QuotaResetPrefix { prefix: String },
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CoordinatorError> {
    if value.is_empty() {
        return Err(CoordinatorError::Malformed(format!(
            "field must not be empty: {field}"
        )));
    }
    Ok(())
}

fn require_positive(field: &str, value: u64) -> Result<(), CoordinatorError> {
    if value == 0 {
        return Err(CoordinatorError::Malformed(format!(
            "field must be greater than zero: {field}"
        )));
    }
    Ok(())
}

impl Action {
    /// Parse and validate a raw request body.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the body is not a JSON object, lacks a string
    ///   `action`, has missing or mistyped fields, or fails validation
    /// - `UnsupportedAction` if the tag is unknown
    pub fn parse(body: &[u8]) -> Result<Self, CoordinatorError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| CoordinatorError::Malformed(format!("invalid JSON: {e}")))?;

        if !value.is_object() {
            return Err(CoordinatorError::Malformed(
                "request body must be a JSON object".to_string(),
            ));
        }

        let tag = value
            .get("action")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                CoordinatorError::Malformed("missing required field: action".to_string())
            })?;

        if ActionKind::from_tag(tag).is_none() {
            return Err(CoordinatorError::UnsupportedAction(tag.to_string()));
        }

        let action: Action = serde_json::from_value(value)
            .map_err(|e| CoordinatorError::Malformed(e.to_string()))?;
        action.validate()?;
        Ok(action)
    }

    /// Check field values that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` naming the offending field.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        match self {
            Action::NonceSet { identifier, .. }
            | Action::NonceGet { identifier }
            | Action::NonceConsume { identifier } => require_non_empty("identifier", identifier),
            Action::RateLimitCheck {
                limiter,
                identifier,
                window_seconds,
                ..
            } => {
                require_non_empty("limiter", limiter)?;
                require_non_empty("identifier", identifier)?;
                require_positive("windowSeconds", *window_seconds)
            }
            Action::QuotaEnsure {
                key, duration_sec, ..
            } => {
                require_non_empty("key", key)?;
                require_positive("durationSec", *duration_sec)
            }
            Action::QuotaIncrement { key, .. } => require_non_empty("key", key),
            Action::QuotaIncrementBatch { entries } => entries
                .iter()
                .try_for_each(|entry| require_non_empty("entries.key", &entry.key)),
            Action::QuotaResetKeys { keys } => keys
                .iter()
                .try_for_each(|key| require_non_empty("keys", key)),
            Action::QuotaResetPrefix { prefix } => require_non_empty("prefix", prefix),
        }
    }

    /// Which of the nine actions this is.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Action::NonceSet { .. } => ActionKind::NonceSet,
            Action::NonceGet { .. } => ActionKind::NonceGet,
            Action::NonceConsume { .. } => ActionKind::NonceConsume,
            Action::RateLimitCheck { .. } => ActionKind::RateLimitCheck,
            Action::QuotaEnsure { .. } => ActionKind::QuotaEnsure,
            Action::QuotaIncrement { .. } => ActionKind::QuotaIncrement,
            Action::QuotaIncrementBatch { .. } => ActionKind::QuotaIncrementBatch,
            Action::QuotaResetKeys { .. } => ActionKind::QuotaResetKeys,
            Action::QuotaResetPrefix { .. } => ActionKind::QuotaResetPrefix,
        }
    }

    /// Run the action to completion against `storage`.
    ///
    /// The caller must hold exclusive access to `storage` for the duration;
    /// the key-space actor guarantees this.
    ///
    /// # Errors
    ///
    /// Propagates `NotInitialized` from the quota tracker and storage failures.
    pub fn execute(
        self,
        storage: &mut dyn Storage,
        now_ms: u64,
    ) -> Result<ActionOutput, CoordinatorError> {
        let output = match self {
            Action::NonceSet {
                identifier,
                value,
                ttl_seconds,
            } => ActionOutput::NonceStored(nonce_registry::set(
                storage,
                now_ms,
                &identifier,
                &value,
                ttl_seconds,
            )?),
            Action::NonceGet { identifier } => {
                ActionOutput::NonceValue(nonce_registry::get(storage, now_ms, &identifier)?)
            }
            Action::NonceConsume { identifier } => {
                ActionOutput::NonceValue(nonce_registry::consume(storage, now_ms, &identifier)?)
            }
            Action::RateLimitCheck {
                limiter,
                identifier,
                limit,
                window_seconds,
            } => ActionOutput::RateLimit(rate_limiter::check(
                storage,
                now_ms,
                &limiter,
                &identifier,
                limit,
                window_seconds,
            )?),
            Action::QuotaEnsure {
                key,
                limit,
                duration_sec,
            } => ActionOutput::QuotaWindow(quota_tracker::ensure(
                storage,
                now_ms,
                &key,
                limit,
                duration_sec,
            )?),
            Action::QuotaIncrement { key, amount } => {
                ActionOutput::QuotaUsage(quota_tracker::increment(storage, now_ms, &key, amount)?)
            }
            Action::QuotaIncrementBatch { entries } => ActionOutput::QuotaBatch(
                quota_tracker::increment_batch(storage, now_ms, &entries)?,
            ),
            Action::QuotaResetKeys { keys } => {
                ActionOutput::Reset(quota_tracker::reset_keys(storage, &keys)?)
            }
            Action::QuotaResetPrefix { prefix } => {
                ActionOutput::Reset(quota_tracker::reset_prefix(storage, now_ms, &prefix)?)
            }
        };
        Ok(output)
    }
}

/// Action-specific result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionOutput {
    NonceStored(NonceStored),
    NonceValue(NonceValue),
    RateLimit(RateLimitDecision),
    QuotaWindow(QuotaWindow),
    QuotaUsage(QuotaUsage),
    QuotaBatch(BatchUsage),
    Reset(ResetReport),
}

/// Success envelope: `{"ok": true, "result": ...}`.
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope {
    pub ok: bool,
    pub result: ActionOutput,
}

impl SuccessEnvelope {
    #[must_use]
    pub fn new(result: ActionOutput) -> Self {
        Self { ok: true, result }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    const NOW: u64 = 1_700_000_000_000;

    fn parse(body: serde_json::Value) -> Result<Action, CoordinatorError> {
        Action::parse(body.to_string().as_bytes())
    }

    fn run(storage: &mut MemoryStorage, body: serde_json::Value) -> serde_json::Value {
        let output = parse(body).unwrap().execute(storage, NOW).unwrap();
        serde_json::to_value(SuccessEnvelope::new(output)).unwrap()
    }

    #[test]
    fn test_parse_every_tag() {
        let bodies = [
            json!({"action": "nonce:set", "identifier": "i", "value": "v", "ttlSeconds": 60}),
            json!({"action": "nonce:get", "identifier": "i"}),
            json!({"action": "nonce:consume", "identifier": "i"}),
            json!({"action": "ratelimit:check", "limiter": "l", "identifier": "i", "limit": 5, "windowSeconds": 60}),
            json!({"action": "quota:ensure", "key": "k", "limit": 5, "durationSec": 60}),
            json!({"action": "quota:increment", "key": "k", "amount": 1}),
            json!({"action": "quota:incrementBatch", "entries": [{"key": "k", "amount": 1.5}]}),
            json!({"action": "quota:resetKeys", "keys": ["k"]}),
            json!({"action": "quota:resetPrefix", "prefix": "user:"}),
        ];

        for body in bodies {
            let tag = body["action"].as_str().unwrap().to_string();
            let action = parse(body).unwrap();
            assert_eq!(action.kind().as_str(), tag);
            assert_eq!(ActionKind::from_tag(&tag), Some(action.kind()));
        }
    }

    #[test]
    fn test_parse_invalid_json_is_malformed() {
        let err = Action::parse(b"{not json").unwrap_err();
        assert!(matches!(err, CoordinatorError::Malformed(_)));

        let err = Action::parse(b"[1, 2]").unwrap_err();
        assert!(matches!(err, CoordinatorError::Malformed(_)));
    }

    #[test]
    fn test_parse_missing_action_field() {
        let err = parse(json!({"identifier": "i"})).unwrap_err();
        assert_eq!(err.client_message(), "missing required field: action");

        let err = parse(json!({"action": 7})).unwrap_err();
        assert_eq!(err.client_message(), "missing required field: action");
    }

    #[test]
    fn test_parse_unknown_action_is_unsupported() {
        let err = parse(json!({"action": "kv:get", "key": "k"})).unwrap_err();
        assert!(matches!(err, CoordinatorError::UnsupportedAction(ref tag) if tag == "kv:get"));
    }

    #[test]
    fn test_parse_missing_or_mistyped_field_is_malformed() {
        let err = parse(json!({"action": "nonce:consume"})).unwrap_err();
        assert!(matches!(err, CoordinatorError::Malformed(ref msg) if msg.contains("identifier")));

        let err = parse(json!({"action": "quota:ensure", "key": "k", "limit": "five", "durationSec": 60}))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Malformed(_)));

        let err = parse(json!({"action": "quota:ensure", "key": "k", "limit": -1, "durationSec": 60}))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Malformed(_)));
    }

    #[test]
    fn test_validation_rejects_empty_and_zero_values() {
        let cases = [
            json!({"action": "nonce:get", "identifier": ""}),
            json!({"action": "ratelimit:check", "limiter": "", "identifier": "i", "limit": 5, "windowSeconds": 60}),
            json!({"action": "ratelimit:check", "limiter": "l", "identifier": "i", "limit": 5, "windowSeconds": 0}),
            json!({"action": "quota:ensure", "key": "k", "limit": 5, "durationSec": 0}),
            json!({"action": "quota:increment", "key": "", "amount": 1}),
            json!({"action": "quota:incrementBatch", "entries": [{"key": "", "amount": 1}]}),
            json!({"action": "quota:resetKeys", "keys": ["ok", ""]}),
            json!({"action": "quota:resetPrefix", "prefix": ""}),
        ];

        for body in cases {
            let err = parse(body.clone()).unwrap_err();
            assert!(
                matches!(err, CoordinatorError::Malformed(_)),
                "expected malformed for {body}"
            );
        }
    }

    #[test]
    fn test_nonce_results_shape() {
        let mut storage = MemoryStorage::new();
        let set = run(
            &mut storage,
            json!({"action": "nonce:set", "identifier": "i", "value": "v", "ttlSeconds": 60}),
        );
        assert_eq!(set, json!({"ok": true, "result": {"expiresAt": NOW / 1000 + 60}}));

        let consumed = run(&mut storage, json!({"action": "nonce:consume", "identifier": "i"}));
        assert_eq!(consumed, json!({"ok": true, "result": {"value": "v"}}));

        let again = run(&mut storage, json!({"action": "nonce:consume", "identifier": "i"}));
        assert_eq!(again, json!({"ok": true, "result": {"value": null}}));
    }

    #[test]
    fn test_rate_limit_result_shape() {
        let mut storage = MemoryStorage::new();
        let result = run(
            &mut storage,
            json!({"action": "ratelimit:check", "limiter": "l", "identifier": "i", "limit": 2, "windowSeconds": 60}),
        );
        assert_eq!(
            result["result"],
            json!({"success": true, "limit": 2, "remaining": 1, "reset": NOW + 60_000})
        );
    }

    #[test]
    fn test_quota_result_shapes() {
        let mut storage = MemoryStorage::new();
        let ensured = run(
            &mut storage,
            json!({"action": "quota:ensure", "key": "k", "limit": 10, "durationSec": 60}),
        );
        assert_eq!(
            ensured["result"],
            json!({"limit": 10, "used": 0, "duration": 60, "resetAt": NOW / 1000 + 60})
        );

        let incremented = run(&mut storage, json!({"action": "quota:increment", "key": "k", "amount": 3}));
        assert_eq!(incremented["result"], json!({"used": 3, "remaining": 7}));

        let batch = run(
            &mut storage,
            json!({"action": "quota:incrementBatch", "entries": [{"key": "k", "amount": 2}]}),
        );
        assert_eq!(
            batch["result"],
            json!({"results": [{"key": "k", "used": 5, "remaining": 5}]})
        );

        let reset = run(&mut storage, json!({"action": "quota:resetPrefix", "prefix": "k"}));
        assert_eq!(reset["result"], json!({"count": 1, "keys": ["k"]}));

        let reset = run(&mut storage, json!({"action": "quota:resetKeys", "keys": ["k"]}));
        assert_eq!(reset["result"], json!({"count": 1, "keys": ["k"]}));
    }

    #[test]
    fn test_execute_increment_without_window() {
        let mut storage = MemoryStorage::new();
        let action = parse(json!({"action": "quota:increment", "key": "k", "amount": 1})).unwrap();
        let err = action.execute(&mut storage, NOW).unwrap_err();
        assert!(matches!(err, CoordinatorError::NotInitialized(_)));
    }
}
