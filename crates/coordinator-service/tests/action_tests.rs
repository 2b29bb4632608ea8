//! End-to-end tests for the nine actions over HTTP.
//!
//! Time-dependent behavior runs against a `ManualClock` so expiry and window
//! boundaries are exact.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use coordinator_service::clock::ManualClock;
use coordinator_test_utils::fixtures;
use coordinator_test_utils::{TestCoordinatorServer, TestServerOptions};
use serde_json::{json, Value};
use std::sync::Arc;

const T0_MS: u64 = 1_700_000_000_000;
const T0_SECS: u64 = T0_MS / 1000;

async fn spawn_at(start_ms: u64) -> Result<(TestCoordinatorServer, Arc<ManualClock>)> {
    let clock = ManualClock::shared(start_ms);
    let server =
        TestCoordinatorServer::spawn_with(TestServerOptions::default().with_clock(clock.clone()))
            .await?;
    Ok((server, clock))
}

/// POST a body and return `(status, json)`.
async fn call(server: &TestCoordinatorServer, body: &Value) -> Result<(u16, Value)> {
    let response = server.post_action(body).await?;
    let status = response.status().as_u16();
    Ok((status, response.json().await?))
}

/// POST a body that must succeed and return its `result`.
async fn ok_result(server: &TestCoordinatorServer, body: &Value) -> Result<Value> {
    let (status, json) = call(server, body).await?;
    assert_eq!(status, 200, "unexpected failure: {json}");
    assert_eq!(json["ok"], true);
    Ok(json["result"].clone())
}

// ============================================================================
// Nonces
// ============================================================================

#[tokio::test]
async fn test_nonce_set_get_consume() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    let stored = ok_result(&server, &fixtures::nonce_set("n-1", "payload", 30)).await?;
    assert_eq!(stored, json!({"expiresAt": T0_SECS + 30}));

    let peeked = ok_result(&server, &fixtures::nonce_get("n-1")).await?;
    assert_eq!(peeked, json!({"value": "payload"}));

    // get does not consume
    let consumed = ok_result(&server, &fixtures::nonce_consume("n-1")).await?;
    assert_eq!(consumed, json!({"value": "payload"}));

    let replayed = ok_result(&server, &fixtures::nonce_consume("n-1")).await?;
    assert_eq!(replayed, json!({"value": null}));

    let after = ok_result(&server, &fixtures::nonce_get("n-1")).await?;
    assert_eq!(after, json!({"value": null}));

    Ok(())
}

#[tokio::test]
async fn test_nonce_expires_after_ttl() -> Result<()> {
    let (server, clock) = spawn_at(T0_MS).await?;

    ok_result(&server, &fixtures::nonce_set("n-2", "v", 5)).await?;

    clock.advance_ms(4_999);
    let live = ok_result(&server, &fixtures::nonce_get("n-2")).await?;
    assert_eq!(live["value"], "v");

    clock.advance_ms(1);
    let expired = ok_result(&server, &fixtures::nonce_consume("n-2")).await?;
    assert_eq!(expired["value"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_nonce_ttl_is_clamped_to_one_second() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    for ttl in [0, -30] {
        let stored = ok_result(&server, &fixtures::nonce_set("n-3", "v", ttl)).await?;
        assert_eq!(stored["expiresAt"], T0_SECS + 1);
    }

    Ok(())
}

#[tokio::test]
async fn test_nonce_set_overwrites() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    ok_result(&server, &fixtures::nonce_set("n-4", "first", 60)).await?;
    ok_result(&server, &fixtures::nonce_set("n-4", "second", 60)).await?;

    let value = ok_result(&server, &fixtures::nonce_consume("n-4")).await?;
    assert_eq!(value["value"], "second");

    Ok(())
}

#[tokio::test]
async fn test_concurrent_consumes_have_one_winner() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;
    let server = Arc::new(server);

    ok_result(&server, &fixtures::nonce_set("race", "token", 60)).await?;

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let server = Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            ok_result(&server, &fixtures::nonce_consume("race"))
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        let result = task.await?;
        if result["value"] == "token" {
            winners += 1;
        } else {
            assert_eq!(result["value"], Value::Null);
        }
    }
    assert_eq!(winners, 1);

    Ok(())
}

// ============================================================================
// Rate limits
// ============================================================================

#[tokio::test]
async fn test_ratelimit_admits_up_to_limit() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;
    let check = fixtures::ratelimit_check("login", "1.2.3.4", 3, 60);

    for expected_remaining in [2, 1, 0] {
        let decision = ok_result(&server, &check).await?;
        assert_eq!(decision["success"], true);
        assert_eq!(decision["limit"], 3);
        assert_eq!(decision["remaining"], expected_remaining);
        assert_eq!(decision["reset"], T0_MS + 60_000);
    }

    let denied = ok_result(&server, &check).await?;
    assert_eq!(denied["success"], false);
    assert_eq!(denied["remaining"], 0);
    assert_eq!(denied["reset"], T0_MS + 60_000);

    Ok(())
}

#[tokio::test]
async fn test_ratelimit_window_slides() -> Result<()> {
    let (server, clock) = spawn_at(T0_MS).await?;
    let check = fixtures::ratelimit_check("api", "user-1", 2, 10);

    ok_result(&server, &check).await?;
    clock.advance_ms(5_000);
    ok_result(&server, &check).await?;

    // Both calls still inside the window
    clock.advance_ms(5_000);
    let denied = ok_result(&server, &check).await?;
    assert_eq!(denied["success"], false);
    assert_eq!(denied["reset"], T0_MS + 10_000);

    // First call has left the window, second has not
    clock.advance_ms(1);
    let admitted = ok_result(&server, &check).await?;
    assert_eq!(admitted["success"], true);
    assert_eq!(admitted["remaining"], 0);
    assert_eq!(admitted["reset"], T0_MS + 5_000 + 10_000);

    Ok(())
}

#[tokio::test]
async fn test_ratelimit_identifiers_are_independent() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    let first = ok_result(&server, &fixtures::ratelimit_check("login", "a", 1, 60)).await?;
    let second = ok_result(&server, &fixtures::ratelimit_check("login", "b", 1, 60)).await?;
    let other_limiter = ok_result(&server, &fixtures::ratelimit_check("signup", "a", 1, 60)).await?;

    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);
    assert_eq!(other_limiter["success"], true);

    Ok(())
}

#[tokio::test]
async fn test_ratelimit_zero_limit_denies() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    let decision = ok_result(&server, &fixtures::ratelimit_check("closed", "x", 0, 60)).await?;
    assert_eq!(decision["success"], false);
    assert_eq!(decision["remaining"], 0);

    Ok(())
}

// ============================================================================
// Quotas
// ============================================================================

#[tokio::test]
async fn test_quota_lifecycle() -> Result<()> {
    let (server, clock) = spawn_at(T0_MS).await?;

    let window = ok_result(&server, &fixtures::quota_ensure("tenant:calls", 10, 3600)).await?;
    assert_eq!(
        window,
        json!({"limit": 10, "used": 0, "duration": 3600, "resetAt": T0_SECS + 3600})
    );

    let usage = ok_result(&server, &fixtures::quota_increment("tenant:calls", 4.0)).await?;
    assert_eq!(usage, json!({"used": 4, "remaining": 6}));

    // Fractional amounts round up
    let usage = ok_result(&server, &fixtures::quota_increment("tenant:calls", 0.2)).await?;
    assert_eq!(usage, json!({"used": 5, "remaining": 5}));

    // ensure on a live window leaves it untouched
    clock.advance_secs(10);
    let again = ok_result(&server, &fixtures::quota_ensure("tenant:calls", 99, 60)).await?;
    assert_eq!(again["limit"], 10);
    assert_eq!(again["used"], 5);
    assert_eq!(again["resetAt"], T0_SECS + 3600);

    // Overshoot is recorded; remaining bottoms out at zero
    let over = ok_result(&server, &fixtures::quota_increment("tenant:calls", 20.0)).await?;
    assert_eq!(over, json!({"used": 25, "remaining": 0}));

    Ok(())
}

#[tokio::test]
async fn test_quota_window_resets_after_duration() -> Result<()> {
    let (server, clock) = spawn_at(T0_MS).await?;

    ok_result(&server, &fixtures::quota_ensure("k", 5, 60)).await?;
    ok_result(&server, &fixtures::quota_increment("k", 3.0)).await?;

    clock.advance_secs(60);
    let (status, body) = call(&server, &fixtures::quota_increment("k", 1.0)).await?;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Quota window not initialized: k");

    let fresh = ok_result(&server, &fixtures::quota_ensure("k", 5, 60)).await?;
    assert_eq!(fresh["used"], 0);
    assert_eq!(fresh["resetAt"], T0_SECS + 120);

    Ok(())
}

#[tokio::test]
async fn test_quota_increment_uninitialized_is_404() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    let (status, body) = call(&server, &fixtures::quota_increment("never", 1.0)).await?;
    assert_eq!(status, 404);
    assert_eq!(body, json!({"ok": false, "error": "Quota window not initialized: never"}));

    Ok(())
}

#[tokio::test]
async fn test_quota_increment_batch() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    ok_result(&server, &fixtures::quota_ensure("a", 10, 60)).await?;
    ok_result(&server, &fixtures::quota_ensure("b", 3, 60)).await?;

    let batch = fixtures::quota_increment_batch(&[("a", 2.0), ("b", 5.0), ("a", 1.0)]);
    let result = ok_result(&server, &batch).await?;
    assert_eq!(
        result,
        json!({"results": [
            {"key": "a", "used": 2, "remaining": 8},
            {"key": "b", "used": 5, "remaining": 0},
            {"key": "a", "used": 3, "remaining": 7},
        ]})
    );

    Ok(())
}

#[tokio::test]
async fn test_quota_batch_with_missing_key_writes_nothing() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    ok_result(&server, &fixtures::quota_ensure("present", 10, 60)).await?;

    let batch = fixtures::quota_increment_batch(&[("present", 4.0), ("absent", 1.0)]);
    let (status, body) = call(&server, &batch).await?;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Quota window not initialized: absent");

    let untouched = ok_result(&server, &fixtures::quota_increment("present", 0.0)).await?;
    assert_eq!(untouched, json!({"used": 0, "remaining": 10}));

    Ok(())
}

#[tokio::test]
async fn test_quota_reset_keys_and_prefix() -> Result<()> {
    let (server, _clock) = spawn_at(T0_MS).await?;

    for key in ["org:1:calls", "org:1:bytes", "org:2:calls"] {
        ok_result(&server, &fixtures::quota_ensure(key, 10, 60)).await?;
    }
    ok_result(&server, &fixtures::nonce_set("org:1:nonce", "v", 60)).await?;

    let by_prefix = ok_result(&server, &fixtures::quota_reset_prefix("org:1:")).await?;
    assert_eq!(
        by_prefix,
        json!({"count": 2, "keys": ["org:1:bytes", "org:1:calls"]})
    );

    // Nonces are out of reach of quota resets
    let nonce = ok_result(&server, &fixtures::nonce_get("org:1:nonce")).await?;
    assert_eq!(nonce["value"], "v");

    let by_keys =
        ok_result(&server, &fixtures::quota_reset_keys(&["org:2:calls", "unknown"])).await?;
    assert_eq!(by_keys, json!({"count": 2, "keys": ["org:2:calls", "unknown"]}));

    let (status, _) = call(&server, &fixtures::quota_increment("org:2:calls", 1.0)).await?;
    assert_eq!(status, 404);

    Ok(())
}
