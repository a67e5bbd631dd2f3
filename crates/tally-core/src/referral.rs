//! Referral types and anti-fraud constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

// ============================================================================
// Constants
// ============================================================================

/// Bonus credits granted to the referrer per completed referral.
pub const REFERRER_REWARD_CREDITS: i64 = 50;

/// Bonus credits granted to the referred user.
pub const REFERRED_REWARD_CREDITS: i64 = 25;

/// Maximum referral credits a referrer may earn per UTC month.
pub const REFERRAL_MONTHLY_CREDIT_CAP: i64 = 500;

/// Maximum referral completions per client IP per UTC day.
pub const REFERRAL_IP_DAILY_LIMIT: u64 = 5;

/// A completed referral.
///
/// `referred_id` is unique across all rows: each user may be referred at
/// most once, ever. The request context (IP, user agent) is retained for
/// anti-fraud counting and later review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    /// The user whose code was redeemed.
    pub referrer_id: UserId,

    /// The user who redeemed the code.
    pub referred_id: UserId,

    /// Credits granted to the referrer.
    pub referrer_credits: i64,

    /// Credits granted to the referred user.
    pub referred_credits: i64,

    /// Client IP of the redeeming request.
    pub ip_address: String,

    /// User agent of the redeeming request, if present.
    pub user_agent: Option<String>,

    /// Lifecycle status.
    pub status: ReferralStatus,

    /// When the referral completed.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    /// Created but rewards not yet applied.
    Pending,

    /// Rewards applied to both wallets.
    Completed,
}
