//! Credit balance, consumption, and grant handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::CreditRecord;
use tally_ledger::{BalanceSnapshot, ConsumeOutcome};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for the audit trail listing.
const RECORDS_DEFAULT_LIMIT: usize = 50;

/// Maximum page size for the audit trail listing.
const RECORDS_MAX_LIMIT: usize = 200;

/// Get the authenticated user's balance.
///
/// Applies the implicit daily reset as a side effect, so the returned
/// daily pool is always for the current UTC day.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let balance = state.engine.get_balance(auth.user_id)?;
    Ok(Json(balance))
}

/// Grant the daily login reward (idempotent per UTC day).
pub async fn grant_daily_login(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    state.check_rate_limit(&format!("daily-login:{}", auth.user_id))?;
    let balance = state.engine.grant_daily_login(auth.user_id)?;
    Ok(Json(balance))
}

/// Reserve check response.
#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    /// Whether the balance meets the minimum reserve.
    pub allowed: bool,

    /// Failure code when not allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,

    /// Current total balance.
    pub available: i64,

    /// The reserve threshold.
    pub required: i64,
}

/// Check whether the user can start a billable operation.
pub async fn check_reserve(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ReserveResponse>, ApiError> {
    let check = state.engine.check_reserve(auth.user_id)?;
    Ok(Json(ReserveResponse {
        allowed: check.allowed,
        code: (!check.allowed).then_some("INSUFFICIENT_CREDITS"),
        available: check.available,
        required: check.required,
    }))
}

/// Consume request body.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// Credits to deduct.
    pub cost: i64,

    /// Optional label for the billable operation, recorded in the audit
    /// trail.
    #[serde(default)]
    pub context: Option<String>,
}

/// Deduct credits for a billable operation.
///
/// Partial consumption is a success: the response carries the smaller
/// `consumed` when funds ran short.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<ConsumeRequest>,
) -> Result<Json<ConsumeOutcome>, ApiError> {
    state.check_rate_limit(&format!("consume:{}", auth.user_id))?;
    let outcome = state.engine.consume(auth.user_id, body.cost, body.context)?;
    Ok(Json(outcome))
}

/// Audit trail query parameters.
#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    /// Page size (default 50, max 200).
    pub limit: Option<usize>,

    /// Offset into the newest-first listing.
    pub offset: Option<usize>,
}

/// Audit trail response.
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    /// Records, newest first.
    pub records: Vec<CreditRecord>,

    /// Number of records in this page.
    pub count: usize,
}

/// List the authenticated user's audit trail, newest first.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(RECORDS_DEFAULT_LIMIT)
        .min(RECORDS_MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let records = state.engine.list_records(auth.user_id, limit, offset)?;
    let count = records.len();

    Ok(Json(RecordsResponse { records, count }))
}

/// Admin grant request body.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// Target user.
    pub user_id: String,

    /// Credits to grant (1..=100000).
    pub amount: i64,

    /// Reason recorded in the ledger and the audit log.
    pub reason: String,
}

/// Manually grant credits to a user (admin only).
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let user_id = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user_id: {}", body.user_id)))?;

    let balance = state
        .engine
        .grant_credits(admin.admin_id, user_id, body.amount, &body.reason)?;

    Ok(Json(balance))
}
