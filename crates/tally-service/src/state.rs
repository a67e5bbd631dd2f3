//! Application state.

use std::sync::Arc;
use std::time::Duration;

use tally_ledger::{LedgerEngine, LedgerError, PaymentEventHandler, RateLimiter};
use tally_store::RocksStore;

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The balance engine.
    pub engine: Arc<LedgerEngine<RocksStore>>,

    /// Payment event handler over the engine.
    pub payments: PaymentEventHandler<RocksStore>,

    /// Sliding-window limiter gating mutation endpoints.
    pub rate_limiter: Arc<RateLimiter>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let engine = Arc::new(LedgerEngine::new(store));
        let payments = PaymentEventHandler::new(Arc::clone(&engine));

        if config.service_api_key.is_none() {
            tracing::warn!("service API key not configured - user endpoints will reject requests");
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("admin API key not configured - admin endpoints will reject requests");
        }
        if config.payment_webhook_secret.is_none() {
            tracing::warn!(
                "payment webhook secret not configured - signature verification disabled"
            );
        }

        Self {
            engine,
            payments,
            rate_limiter: Arc::new(RateLimiter::new()),
            config,
        }
    }

    /// The configured sliding window.
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.config.rate_limit_window_ms)
    }

    /// Gate a mutation request on the sliding-window limiter.
    ///
    /// # Errors
    ///
    /// Returns a `RATE_LIMITED` error carrying the retry-after hint when
    /// the key is at capacity.
    pub fn check_rate_limit(&self, key: &str) -> Result<(), ApiError> {
        let decision = self.rate_limiter.check(
            key,
            self.rate_limit_window(),
            self.config.rate_limit_max_requests,
        );

        if decision.allowed {
            Ok(())
        } else {
            Err(LedgerError::RateLimited {
                retry_after_ms: u64::try_from(decision.retry_after.as_millis())
                    .unwrap_or(u64::MAX),
            }
            .into())
        }
    }
}
