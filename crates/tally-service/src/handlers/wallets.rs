//! Wallet lifecycle handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use tally_ledger::BalanceSnapshot;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Create the authenticated user's wallet, granting the signup bonus.
///
/// Idempotent: re-registering returns the existing balance.
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let balance = state.engine.create_wallet(auth.user_id)?;
    Ok(Json(balance))
}
