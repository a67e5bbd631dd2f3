//! Common test utilities for tally integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use tally_core::UserId;
use tally_service::{create_router, AppState, ServiceConfig};
use tally_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// An admin ID for privileged requests.
    pub admin_id: UserId,
    /// The gateway service API key.
    pub service_api_key: String,
    /// The admin API key.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness with a tweaked configuration.
    pub fn with_config(tweak: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            payment_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 100,
        };
        tweak(&mut config);

        let state = AppState::new(store, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id: UserId::generate(),
            admin_id: UserId::generate(),
            service_api_key,
            admin_api_key,
        }
    }

    /// Create a wallet for a user through the API.
    pub async fn create_wallet(&self, user: UserId) {
        self.server
            .post("/v1/wallets")
            .add_header("x-api-key", self.service_api_key.as_str())
            .add_header("x-user-id", user.to_string())
            .await
            .assert_status_ok();
    }

    /// Fetch a user's balance through the API.
    pub async fn balance(&self, user: UserId) -> serde_json::Value {
        let response = self
            .server
            .get("/v1/credits/balance")
            .add_header("x-api-key", self.service_api_key.as_str())
            .add_header("x-user-id", user.to_string())
            .await;
        response.assert_status_ok();
        response.json()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
