//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, health, referrals, wallets, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for credit endpoints, which take the
/// per-user serialization path.
const CREDITS_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Wallets (gateway auth)
/// - `POST /v1/wallets` - Create wallet at signup
///
/// ## Credits (gateway auth, rate-limited mutations)
/// - `GET /v1/credits/balance` - Current balance
/// - `POST /v1/credits/daily-login` - Daily login reward
/// - `POST /v1/credits/check` - Reserve pre-check
/// - `POST /v1/credits/consume` - Deduct credits
/// - `GET /v1/credits/records` - Audit trail
/// - `POST /v1/credits/grant` - Admin credit grant (admin key)
///
/// ## Referrals (gateway auth, rate-limited)
/// - `POST /v1/referrals/apply` - Redeem a referral code
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/payments` - Payment provider events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Credit endpoints carry the bulk of the traffic (every billable
    // operation consumes), so they get their own concurrency cap.
    let credit_routes = Router::new()
        .route("/balance", get(credits::get_balance))
        .route("/daily-login", post(credits::grant_daily_login))
        .route("/check", post(credits::check_reserve))
        .route("/consume", post(credits::consume))
        .route("/records", get(credits::list_records))
        .route("/grant", post(credits::grant_credits))
        .layer(ConcurrencyLimitLayer::new(CREDITS_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/wallets", post(wallets::create_wallet))
        .route("/referrals/apply", post(referrals::apply_referral))
        .nest("/credits", credit_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // API v1 routes
        .nest("/v1", api_routes)
        // Webhooks (no concurrency cap - delivery is controlled by the provider)
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
