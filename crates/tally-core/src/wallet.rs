//! Wallet types for the tally ledger.
//!
//! This module defines the per-user wallet with its three credit pools and
//! the pure reset/deduction logic the balance engine runs on every
//! balance-touching operation.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

// ============================================================================
// Constants
// ============================================================================

/// Credits granted by the daily login reward.
pub const DAILY_LOGIN_REWARD_CREDITS: i64 = 20;

/// Minimum total balance required to start a billable operation whose cost
/// is not known in advance.
pub const MIN_RESERVE_CREDITS: i64 = 10;

/// Bonus credits granted once when a wallet is created.
pub const SIGNUP_BONUS_CREDITS: i64 = 30;

/// Upper bound for a single admin credit grant.
pub const ADMIN_GRANT_MAX_CREDITS: i64 = 100_000;

/// Starter tier monthly credit allowance.
pub const STARTER_TIER_CREDITS: i64 = 500;

/// Pro tier monthly credit allowance.
pub const PRO_TIER_CREDITS: i64 = 2_000;

/// Max tier monthly credit allowance.
pub const MAX_TIER_CREDITS: i64 = 10_000;

/// A subscription tier.
///
/// The tier determines the *limit* of the subscription pool; the stored
/// pool balance is only ever replaced by renewal or cancellation events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// No subscription: the subscription pool limit is zero.
    #[default]
    Free,

    /// Starter tier.
    Starter,

    /// Pro tier.
    Pro,

    /// Max tier.
    Max,
}

impl SubscriptionTier {
    /// Get the subscription pool limit for this tier.
    #[must_use]
    pub const fn credits_limit(self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Starter => STARTER_TIER_CREDITS,
            Self::Pro => PRO_TIER_CREDITS,
            Self::Max => MAX_TIER_CREDITS,
        }
    }

    /// Get the tier name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Max => "max",
        }
    }
}

/// A per-user wallet.
///
/// One row per user, owned exclusively by the balance engine. All
/// mutations go through a single atomic store commit together with their
/// audit records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// The user this wallet belongs to.
    pub user_id: UserId,

    /// Daily login pool. Zeroed when `daily_reset_at` falls outside the
    /// current UTC day.
    pub daily_credits: i64,

    /// When the daily pool was last reset or granted.
    pub daily_reset_at: Option<DateTime<Utc>>,

    /// Subscription pool. Replaced (not stacked) on renewal, zeroed on
    /// cancellation; never decayed by time alone.
    pub subscription_credits: i64,

    /// When the subscription pool was last replaced.
    pub subscription_reset_at: Option<DateTime<Utc>>,

    /// Bonus pool: purchases, referrals, admin grants. Never expires.
    pub bonus_credits: i64,

    /// Subscription tier as last reported by the payment provider.
    pub tier: SubscriptionTier,

    /// When the subscription lapses. A past value means the effective
    /// tier is `Free` regardless of `tier`.
    pub subscription_expires_at: Option<DateTime<Utc>>,

    /// Referral credits earned by this user as a referrer in the current
    /// UTC month.
    pub referral_month_credits: i64,

    /// Month stamp for `referral_month_credits`; rolled over on use, not
    /// by a scheduler.
    pub referral_month_at: Option<DateTime<Utc>>,

    /// Lifetime referral credits earned as a referrer.
    pub lifetime_referral_credits: i64,

    /// Number of completed referrals as a referrer.
    pub referral_count: i64,

    /// When the wallet was created.
    pub created_at: DateTime<Utc>,

    /// When the wallet was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet with all pools at zero.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            daily_credits: 0,
            daily_reset_at: None,
            subscription_credits: 0,
            subscription_reset_at: None,
            bonus_credits: 0,
            tier: SubscriptionTier::Free,
            subscription_expires_at: None,
            referral_month_credits: 0,
            referral_month_at: None,
            lifetime_referral_credits: 0,
            referral_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of all three pools.
    #[must_use]
    pub const fn total_available(&self) -> i64 {
        self.daily_credits + self.subscription_credits + self.bonus_credits
    }

    /// The tier after accounting for expiry.
    #[must_use]
    pub fn effective_tier(&self, now: DateTime<Utc>) -> SubscriptionTier {
        match self.subscription_expires_at {
            Some(expires_at) if expires_at > now => self.tier,
            _ => SubscriptionTier::Free,
        }
    }

    /// Zero the daily pool if its stamp falls outside the current UTC day.
    ///
    /// Returns `true` if the wallet changed. Invoked at the start of every
    /// balance-touching operation instead of by a scheduled job.
    pub fn apply_daily_reset(&mut self, now: DateTime<Utc>) -> bool {
        if !needs_daily_reset(self.daily_reset_at, now) {
            return false;
        }
        self.daily_credits = 0;
        self.daily_reset_at = Some(now);
        true
    }

    /// Zero the monthly referral counter if its stamp falls outside the
    /// current UTC month.
    ///
    /// Returns `true` if the wallet changed.
    pub fn rollover_referral_month(&mut self, now: DateTime<Utc>) -> bool {
        if !needs_monthly_rollover(self.referral_month_at, now) {
            return false;
        }
        self.referral_month_credits = 0;
        self.referral_month_at = Some(now);
        true
    }

    /// Deduct up to `cost` credits across the pools in priority order:
    /// daily first, then subscription, then bonus, each clamped at zero.
    ///
    /// Daily credits expire soonest so they are spent first; bonus credits
    /// never expire so they are spent last. Returns the per-pool split;
    /// the total may be less than `cost` (partial consumption).
    pub fn deduct(&mut self, cost: i64) -> Deduction {
        let daily = cost.min(self.daily_credits);
        self.daily_credits -= daily;

        let subscription = (cost - daily).min(self.subscription_credits);
        self.subscription_credits -= subscription;

        let bonus = (cost - daily - subscription).min(self.bonus_credits);
        self.bonus_credits -= bonus;

        Deduction {
            daily,
            subscription,
            bonus,
        }
    }

    /// Stamp the wallet as updated.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// A per-pool deduction produced by [`Wallet::deduct`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deduction {
    /// Credits taken from the daily pool.
    pub daily: i64,

    /// Credits taken from the subscription pool.
    pub subscription: i64,

    /// Credits taken from the bonus pool.
    pub bonus: i64,
}

impl Deduction {
    /// Total credits deducted across all pools.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.daily + self.subscription + self.bonus
    }
}

/// Whether the daily pool stamp falls outside the current UTC calendar
/// day.
///
/// A missing stamp counts as stale. Compared by calendar date, so the
/// check crosses month and year boundaries correctly.
#[must_use]
pub fn needs_daily_reset(last_reset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_reset_at {
        Some(last) => last.date_naive() != now.date_naive(),
        None => true,
    }
}

/// Whether the monthly referral stamp falls outside the current UTC
/// calendar month.
#[must_use]
pub fn needs_monthly_rollover(last_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_at {
        Some(last) => (last.year(), last.month()) != (now.year(), now.month()),
        None => true,
    }
}

/// The subscription pool limit for a tier, accounting for expiry.
///
/// Returns 0 once `expires_at` is in the past, regardless of tier.
#[must_use]
pub fn subscription_credits_limit(
    tier: SubscriptionTier,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    match expires_at {
        Some(exp) if exp > now => tier.credits_limit(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn new_wallet_is_empty() {
        let wallet = Wallet::new(UserId::generate(), Utc::now());
        assert_eq!(wallet.total_available(), 0);
        assert_eq!(wallet.tier, SubscriptionTier::Free);
        assert!(wallet.daily_reset_at.is_none());
    }

    #[test]
    fn deduct_spends_daily_then_subscription_then_bonus() {
        let mut wallet = Wallet::new(UserId::generate(), Utc::now());
        wallet.daily_credits = 20;
        wallet.subscription_credits = 30;
        wallet.bonus_credits = 50;

        let deduction = wallet.deduct(40);

        assert_eq!(deduction.daily, 20);
        assert_eq!(deduction.subscription, 20);
        assert_eq!(deduction.bonus, 0);
        assert_eq!(deduction.total(), 40);
        assert_eq!(wallet.daily_credits, 0);
        assert_eq!(wallet.subscription_credits, 10);
        assert_eq!(wallet.bonus_credits, 50);
    }

    #[test]
    fn deduct_clamps_at_zero_on_shortfall() {
        let mut wallet = Wallet::new(UserId::generate(), Utc::now());
        wallet.daily_credits = 3;
        wallet.bonus_credits = 1;

        let deduction = wallet.deduct(10);

        assert_eq!(deduction.total(), 4);
        assert_eq!(wallet.daily_credits, 0);
        assert_eq!(wallet.subscription_credits, 0);
        assert_eq!(wallet.bonus_credits, 0);
    }

    #[test]
    fn daily_reset_compares_utc_calendar_dates() {
        let last = ts("2025-01-31T23:59:59Z");
        assert!(needs_daily_reset(Some(last), ts("2025-02-01T00:00:00Z")));
        assert!(!needs_daily_reset(Some(last), ts("2025-01-31T00:00:01Z")));
        assert!(needs_daily_reset(
            Some(ts("2024-12-31T12:00:00Z")),
            ts("2025-01-01T12:00:00Z")
        ));
        assert!(needs_daily_reset(None, Utc::now()));
    }

    #[test]
    fn apply_daily_reset_zeroes_and_stamps() {
        let mut wallet = Wallet::new(UserId::generate(), ts("2025-01-31T10:00:00Z"));
        wallet.daily_credits = 15;
        wallet.daily_reset_at = Some(ts("2025-01-31T10:00:00Z"));

        let now = ts("2025-02-01T00:00:00Z");
        assert!(wallet.apply_daily_reset(now));
        assert_eq!(wallet.daily_credits, 0);
        assert_eq!(wallet.daily_reset_at, Some(now));

        // Same day again: no change.
        assert!(!wallet.apply_daily_reset(ts("2025-02-01T23:00:00Z")));
    }

    #[test]
    fn monthly_rollover_compares_year_and_month() {
        let last = ts("2025-01-15T12:00:00Z");
        assert!(!needs_monthly_rollover(Some(last), ts("2025-01-31T23:59:59Z")));
        assert!(needs_monthly_rollover(Some(last), ts("2025-02-01T00:00:00Z")));
        assert!(needs_monthly_rollover(
            Some(ts("2024-02-10T00:00:00Z")),
            ts("2025-02-10T00:00:00Z")
        ));
    }

    #[test]
    fn effective_tier_free_after_expiry() {
        let now = ts("2025-06-01T00:00:00Z");
        let mut wallet = Wallet::new(UserId::generate(), now);
        wallet.tier = SubscriptionTier::Pro;

        wallet.subscription_expires_at = Some(ts("2025-07-01T00:00:00Z"));
        assert_eq!(wallet.effective_tier(now), SubscriptionTier::Pro);

        wallet.subscription_expires_at = Some(ts("2025-05-01T00:00:00Z"));
        assert_eq!(wallet.effective_tier(now), SubscriptionTier::Free);

        wallet.subscription_expires_at = None;
        assert_eq!(wallet.effective_tier(now), SubscriptionTier::Free);
    }

    #[test]
    fn limit_is_zero_for_every_expired_tier() {
        let now = ts("2025-06-01T00:00:00Z");
        let expired = Some(ts("2025-05-31T23:59:59Z"));
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Starter,
            SubscriptionTier::Pro,
            SubscriptionTier::Max,
        ] {
            assert_eq!(subscription_credits_limit(tier, expired, now), 0);
        }
        assert_eq!(
            subscription_credits_limit(
                SubscriptionTier::Pro,
                Some(ts("2025-07-01T00:00:00Z")),
                now
            ),
            PRO_TIER_CREDITS
        );
    }

    #[test]
    fn tier_limits() {
        assert_eq!(SubscriptionTier::Free.credits_limit(), 0);
        assert_eq!(SubscriptionTier::Starter.credits_limit(), 500);
        assert_eq!(SubscriptionTier::Pro.credits_limit(), 2000);
        assert_eq!(SubscriptionTier::Max.credits_limit(), 10000);
    }
}
