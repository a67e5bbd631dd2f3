//! Error types for the balance engine.

use tally_core::UserId;
use tally_store::StoreError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// Each variant maps to a stable failure code via [`LedgerError::code`],
/// which is what the HTTP surface reports to callers.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No wallet exists for the user.
    #[error("user not found: {user_id}")]
    UserNotFound {
        /// The user ID that was not found.
        user_id: UserId,
    },

    /// Balance below the required reserve.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Current total balance.
        available: i64,
        /// Required amount.
        required: i64,
    },

    /// A user tried to redeem their own referral code.
    #[error("a user cannot redeem their own referral code")]
    SelfReferral,

    /// The referred user already has a referral (referred at most once,
    /// ever).
    #[error("referral already applied for user {user_id}")]
    ReferralAlreadyApplied {
        /// The referred user id.
        user_id: String,
    },

    /// The referrer reached the monthly referral credit cap.
    #[error("referrer has reached the monthly referral credit cap")]
    ReferralMonthlyLimit,

    /// Too many referral completions from the requesting IP today.
    #[error("too many referral completions from this address today")]
    ReferralIpLimit,

    /// Request rejected by the sliding-window rate limiter.
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited {
        /// Time until the window frees a slot, in milliseconds.
        retry_after_ms: u64,
    },

    /// Amount outside the accepted range for the operation.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Storage failure; the whole operation rolled back.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Stable failure code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::SelfReferral => "SELF_REFERRAL",
            Self::ReferralAlreadyApplied { .. } => "ALREADY_APPLIED",
            Self::ReferralMonthlyLimit => "MONTHLY_LIMIT",
            Self::ReferralIpLimit => "IP_LIMIT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReferralExists { referred_id } => Self::ReferralAlreadyApplied {
                user_id: referred_id,
            },
            // Paths that care about order idempotency intercept
            // `DuplicateOrder` before this conversion runs.
            StoreError::DuplicateOrder { session_id } => {
                Self::Storage(format!("duplicate order: {session_id}"))
            }
            StoreError::NotFound { entity, id } => Self::Storage(format!("{entity} not found: {id}")),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}
