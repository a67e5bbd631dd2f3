//! Authentication extractors.
//!
//! Identity verification is an external concern: the gateway in front of
//! this service authenticates end users and forwards their id. This
//! module provides extractors for:
//! - `AuthUser` - the gateway-authenticated user id behind the service
//!   API key
//! - `AdminAuth` - privileged endpoints behind the admin API key

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use tally_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated end user, as asserted by the gateway.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Only the gateway holds the service key; a valid key means the
        // forwarded user id was already verified upstream.
        require_key(parts, "x-api-key", state.config.service_api_key.as_deref())?;

        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(Self { user_id })
    }
}

/// Admin authentication for privileged endpoints.
///
/// Requires the `X-Admin-Key` header to match the configured admin key
/// and an `X-Admin-Id` header identifying the operator for the audit
/// trail.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Operator identifier (recorded in grant metadata and audit logs).
    pub admin_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_key(parts, "x-admin-key", state.config.admin_api_key.as_deref())?;

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(Self { admin_id })
    }
}

/// Compare a header against a configured key. A missing configuration
/// rejects everything rather than failing open.
fn require_key(parts: &Parts, header: &str, expected: Option<&str>) -> Result<(), ApiError> {
    let presented = parts
        .headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let expected = expected.ok_or(ApiError::Unauthorized)?;

    if presented == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
