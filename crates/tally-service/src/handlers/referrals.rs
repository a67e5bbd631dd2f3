//! Referral redemption handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use tally_ledger::{ReferralOutcome, RequestContext};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Referral application request body.
#[derive(Debug, Deserialize)]
pub struct ApplyReferralRequest {
    /// The referrer whose code the authenticated user redeems.
    pub referrer_id: String,
}

/// Redeem a referral code for the authenticated user.
pub async fn apply_referral(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(body): Json<ApplyReferralRequest>,
) -> Result<Json<ReferralOutcome>, ApiError> {
    state.check_rate_limit(&format!("referral:{}", auth.user_id))?;

    let referrer_id = body
        .referrer_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid referrer_id: {}", body.referrer_id)))?;

    let ctx = RequestContext {
        ip_address: client_ip(&headers),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };

    let outcome = state
        .engine
        .apply_referral_code(auth.user_id, referrer_id, &ctx)?;

    Ok(Json(outcome))
}

/// Client IP as forwarded by the gateway.
///
/// The first entry of `X-Forwarded-For` is the originating client; the
/// gateway strips any spoofed values before forwarding.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
