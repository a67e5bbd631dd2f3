//! Credit endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// Wallets & Balance
// ============================================================================

#[tokio::test]
async fn create_wallet_grants_signup_bonus() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;

    harness.create_wallet(user).await;

    let balance = harness.balance(user).await;
    assert_eq!(balance["bonus_credits"], 30);
    assert_eq!(balance["total_available"], 30);
    assert_eq!(balance["tier"], "free");

    // Re-registering is idempotent.
    harness.create_wallet(user).await;
    let balance = harness.balance(user).await;
    assert_eq!(balance["total_available"], 30);
}

#[tokio::test]
async fn balance_without_api_key_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("x-user-id", harness.test_user_id.to_string())
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn balance_for_unknown_user_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", harness.test_user_id.to_string())
        .await;

    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
}

// ============================================================================
// Daily Login
// ============================================================================

#[tokio::test]
async fn daily_login_is_idempotent_per_day() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    for _ in 0..2 {
        let response = harness
            .server
            .post("/v1/credits/daily-login")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .add_header("x-user-id", user.to_string())
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["daily_credits"], 20);
        assert_eq!(body["total_available"], 50);
    }

    let response = harness
        .server
        .get("/v1/credits/records")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let daily_logins = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["record_type"] == "daily_login")
        .count();
    assert_eq!(daily_logins, 1);
}

// ============================================================================
// Consume
// ============================================================================

#[tokio::test]
async fn consume_spends_daily_before_bonus() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    harness
        .server
        .post("/v1/credits/daily-login")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .await
        .assert_status_ok();

    // daily=20, bonus=30; a cost of 25 must exhaust daily first.
    let response = harness
        .server
        .post("/v1/credits/consume")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .json(&json!({ "cost": 25, "context": "render" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["consumed"], 25);
    assert_eq!(body["shortfall"], 0);
    assert_eq!(body["balance"]["daily_credits"], 0);
    assert_eq!(body["balance"]["bonus_credits"], 25);
}

#[tokio::test]
async fn consume_shortfall_is_success() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    let response = harness
        .server
        .post("/v1/credits/consume")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .json(&json!({ "cost": 100 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["requested"], 100);
    assert_eq!(body["consumed"], 30);
    assert_eq!(body["shortfall"], 70);
    assert_eq!(body["balance"]["total_available"], 0);
}

#[tokio::test]
async fn consume_negative_cost_rejected() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    let response = harness
        .server
        .post("/v1/credits/consume")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .json(&json!({ "cost": -5 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");
}

// ============================================================================
// Reserve Check
// ============================================================================

#[tokio::test]
async fn check_reserve_thresholds() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    let response = harness
        .server
        .post("/v1/credits/check")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["allowed"], true);

    // Drop below the reserve threshold of 10.
    harness
        .server
        .post("/v1/credits/consume")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .json(&json!({ "cost": 25 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/v1/credits/check")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["code"], "INSUFFICIENT_CREDITS");
    assert_eq!(body["available"], 5);
}

// ============================================================================
// Audit Trail
// ============================================================================

#[tokio::test]
async fn records_are_balanced_and_newest_first() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    harness
        .server
        .post("/v1/credits/consume")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .json(&json!({ "cost": 10 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/credits/records")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    let records = body["records"].as_array().unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(records[0]["record_type"], "generation");
    assert_eq!(records[0]["amount"], -10);
    assert_eq!(records[1]["record_type"], "signup_bonus");

    for record in records {
        let before = record["balance_before"].as_i64().unwrap();
        let after = record["balance_after"].as_i64().unwrap();
        let amount = record["amount"].as_i64().unwrap();
        assert_eq!(after, before + amount);
    }
}

// ============================================================================
// Admin Grant
// ============================================================================

#[tokio::test]
async fn admin_grant_requires_admin_key() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .json(&json!({
            "user_id": user.to_string(),
            "amount": 100,
            "reason": "no auth"
        }))
        .await;
    response.assert_status_unauthorized();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", "wrong-key")
        .add_header("x-admin-id", harness.admin_id.to_string())
        .json(&json!({
            "user_id": user.to_string(),
            "amount": 100,
            "reason": "wrong key"
        }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn admin_grant_adds_bonus_credits() {
    let harness = TestHarness::new();
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", harness.admin_api_key.as_str())
        .add_header("x-admin-id", harness.admin_id.to_string())
        .json(&json!({
            "user_id": user.to_string(),
            "amount": 250,
            "reason": "support goodwill"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["bonus_credits"], 280);

    // Out-of-range amounts are rejected before any mutation.
    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", harness.admin_api_key.as_str())
        .add_header("x-admin-id", harness.admin_id.to_string())
        .json(&json!({
            "user_id": user.to_string(),
            "amount": 0,
            "reason": "zero"
        }))
        .await;
    response.assert_status_bad_request();
}

// ============================================================================
// Rate Limiting
// ============================================================================

#[tokio::test]
async fn consume_is_rate_limited() {
    let harness = TestHarness::with_config(|config| {
        config.rate_limit_max_requests = 2;
    });
    let user = harness.test_user_id;
    harness.create_wallet(user).await;

    for _ in 0..2 {
        harness
            .server
            .post("/v1/credits/consume")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .add_header("x-user-id", user.to_string())
            .json(&json!({ "cost": 1 }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .post("/v1/credits/consume")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-user-id", user.to_string())
        .json(&json!({ "cost": 1 }))
        .await;

    assert_eq!(response.status_code(), 429);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert!(body["error"]["details"]["retry_after_ms"].as_u64().is_some());
}
