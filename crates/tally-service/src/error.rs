//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tally_ledger::LedgerError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A ledger operation failed with a typed code.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".to_string(),
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "not_found".to_string(),
                msg.clone(),
                None,
            ),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request".to_string(),
                msg.clone(),
                None,
            ),
            Self::Ledger(err) => ledger_response(err),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Map a ledger failure onto a status, its stable code, and details.
fn ledger_response(err: &LedgerError) -> (StatusCode, String, String, Option<serde_json::Value>) {
    let code = err.code().to_string();
    match err {
        LedgerError::UserNotFound { .. } => (StatusCode::NOT_FOUND, code, err.to_string(), None),
        LedgerError::InsufficientCredits {
            available,
            required,
        } => (
            StatusCode::PAYMENT_REQUIRED,
            code,
            err.to_string(),
            Some(serde_json::json!({
                "available": available,
                "required": required
            })),
        ),
        LedgerError::SelfReferral | LedgerError::InvalidAmount(_) => {
            (StatusCode::BAD_REQUEST, code, err.to_string(), None)
        }
        LedgerError::ReferralAlreadyApplied { .. } => {
            (StatusCode::CONFLICT, code, err.to_string(), None)
        }
        LedgerError::ReferralMonthlyLimit | LedgerError::ReferralIpLimit => {
            (StatusCode::TOO_MANY_REQUESTS, code, err.to_string(), None)
        }
        LedgerError::RateLimited { retry_after_ms } => (
            StatusCode::TOO_MANY_REQUESTS,
            code,
            err.to_string(),
            Some(serde_json::json!({ "retry_after_ms": retry_after_ms })),
        ),
        LedgerError::Storage(msg) => {
            tracing::error!(error = %msg, "Storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "An internal error occurred".to_string(),
                None,
            )
        }
    }
}
