//! Audit ledger records.
//!
//! Every wallet mutation appends a `CreditRecord`. Records are immutable
//! once written and are never deleted, so a user's balance history can be
//! replayed for billing disputes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wallet::{Deduction, SubscriptionTier};
use crate::{RecordId, UserId};

/// One entry in the append-only audit ledger.
///
/// `balance_before` and `balance_after` are the sum of all three pools at
/// the instant of the mutation; `balance_after == balance_before + amount`
/// holds for every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRecord {
    /// Unique record ID (ULID for time-ordering).
    pub id: RecordId,

    /// The user whose balance changed.
    pub user_id: UserId,

    /// What kind of mutation this was.
    pub record_type: RecordType,

    /// Signed credit delta. Negative for consumption.
    pub amount: i64,

    /// Total balance across all pools before the mutation.
    pub balance_before: i64,

    /// Total balance across all pools after the mutation.
    pub balance_after: i64,

    /// Which pool the mutation touched (`Mixed` for consumption, which
    /// may span pools).
    pub pool: CreditPool,

    /// Typed metadata for this record kind.
    pub metadata: RecordMetadata,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl CreditRecord {
    fn new(
        user_id: UserId,
        record_type: RecordType,
        amount: i64,
        balance_before: i64,
        pool: CreditPool,
        metadata: RecordMetadata,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            user_id,
            record_type,
            amount,
            balance_before,
            balance_after: balance_before + amount,
            pool,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Signup bonus granted at wallet creation.
    #[must_use]
    pub fn signup_bonus(user_id: UserId, amount: i64, balance_before: i64) -> Self {
        Self::new(
            user_id,
            RecordType::SignupBonus,
            amount,
            balance_before,
            CreditPool::Bonus,
            RecordMetadata::None,
        )
    }

    /// Daily login reward.
    #[must_use]
    pub fn daily_login(user_id: UserId, amount: i64, balance_before: i64) -> Self {
        Self::new(
            user_id,
            RecordType::DailyLogin,
            amount,
            balance_before,
            CreditPool::Daily,
            RecordMetadata::None,
        )
    }

    /// Consumption by a billable operation. `amount` is always recorded
    /// as a negative delta.
    #[must_use]
    pub fn generation(
        user_id: UserId,
        consumed: i64,
        balance_before: i64,
        requested: i64,
        deduction: Deduction,
        context: Option<String>,
    ) -> Self {
        Self::new(
            user_id,
            RecordType::Generation,
            -consumed.abs(),
            balance_before,
            CreditPool::Mixed,
            RecordMetadata::Generation {
                daily: deduction.daily,
                subscription: deduction.subscription,
                bonus: deduction.bonus,
                requested,
                context,
            },
        )
    }

    /// Credit purchase applied from a provider checkout session.
    #[must_use]
    pub fn purchase(
        user_id: UserId,
        amount: i64,
        balance_before: i64,
        session_id: String,
    ) -> Self {
        Self::new(
            user_id,
            RecordType::Purchase,
            amount,
            balance_before,
            CreditPool::Bonus,
            RecordMetadata::Purchase { session_id },
        )
    }

    /// Subscription pool replaced on purchase or renewal. `amount` is the
    /// delta between the new tier limit and the previous pool balance.
    #[must_use]
    pub fn subscription_reset(
        user_id: UserId,
        amount: i64,
        balance_before: i64,
        tier: SubscriptionTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(
            user_id,
            RecordType::SubscriptionReset,
            amount,
            balance_before,
            CreditPool::Subscription,
            RecordMetadata::SubscriptionReset { tier, expires_at },
        )
    }

    /// Manual grant by an operator.
    #[must_use]
    pub fn admin_grant(
        user_id: UserId,
        amount: i64,
        balance_before: i64,
        admin_id: UserId,
        reason: String,
    ) -> Self {
        Self::new(
            user_id,
            RecordType::AdminGrant,
            amount,
            balance_before,
            CreditPool::Bonus,
            RecordMetadata::AdminGrant { admin_id, reason },
        )
    }

    /// Reward to the referrer when a referral completes.
    #[must_use]
    pub fn referral_inviter(
        user_id: UserId,
        amount: i64,
        balance_before: i64,
        counterpart: UserId,
    ) -> Self {
        Self::new(
            user_id,
            RecordType::ReferralInviter,
            amount,
            balance_before,
            CreditPool::Bonus,
            RecordMetadata::Referral { counterpart },
        )
    }

    /// Reward to the referred user when a referral completes.
    #[must_use]
    pub fn referral_invitee(
        user_id: UserId,
        amount: i64,
        balance_before: i64,
        counterpart: UserId,
    ) -> Self {
        Self::new(
            user_id,
            RecordType::ReferralInvitee,
            amount,
            balance_before,
            CreditPool::Bonus,
            RecordMetadata::Referral { counterpart },
        )
    }

    /// Whether `balance_after == balance_before + amount` holds.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.balance_after == self.balance_before + self.amount
    }
}

/// Kind of ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// One-time bonus at wallet creation.
    SignupBonus,

    /// Daily login reward.
    DailyLogin,

    /// Credits consumed by a billable operation.
    Generation,

    /// Credits purchased through the payment provider.
    Purchase,

    /// Subscription pool replaced on purchase or renewal.
    SubscriptionReset,

    /// Manual operator grant.
    AdminGrant,

    /// Referral reward to the referrer.
    ReferralInviter,

    /// Referral reward to the referred user.
    ReferralInvitee,
}

/// Which pool a record touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPool {
    /// Daily login pool.
    Daily,

    /// Subscription pool.
    Subscription,

    /// Bonus pool.
    Bonus,

    /// Consumption spanning multiple pools.
    Mixed,
}

/// Typed metadata carried by a record.
///
/// Modeled as a tagged union with known fields per record kind rather
/// than an open key-value bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordMetadata {
    /// No extra context.
    None,

    /// Per-pool split of a consumption.
    Generation {
        /// Credits taken from the daily pool.
        daily: i64,
        /// Credits taken from the subscription pool.
        subscription: i64,
        /// Credits taken from the bonus pool.
        bonus: i64,
        /// The cost the caller asked for (may exceed the deducted total
        /// on partial consumption).
        requested: i64,
        /// Caller-supplied label for the billable operation.
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    /// Provider checkout session that produced a purchase.
    Purchase {
        /// Provider-issued session id (the idempotency key).
        session_id: String,
    },

    /// Tier applied by a subscription event.
    SubscriptionReset {
        /// The tier the pool was reset to.
        tier: SubscriptionTier,
        /// When the subscription lapses.
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Operator grant context.
    AdminGrant {
        /// The operator who issued the grant.
        admin_id: UserId,
        /// Free-form reason for the grant.
        reason: String,
    },

    /// The other party of a referral.
    Referral {
        /// The referrer for an invitee record, the invitee for an
        /// inviter record.
        counterpart: UserId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_balanced() {
        let user = UserId::generate();
        let record = CreditRecord::purchase(user, 500, 120, "cs_test_123".into());
        assert_eq!(record.amount, 500);
        assert_eq!(record.balance_before, 120);
        assert_eq!(record.balance_after, 620);
        assert!(record.is_balanced());
    }

    #[test]
    fn generation_amount_is_negative() {
        let user = UserId::generate();
        let deduction = Deduction {
            daily: 20,
            subscription: 20,
            bonus: 0,
        };
        let record = CreditRecord::generation(user, 40, 100, 40, deduction, Some("image".into()));

        assert_eq!(record.amount, -40);
        assert_eq!(record.balance_after, 60);
        assert_eq!(record.pool, CreditPool::Mixed);
        assert!(record.is_balanced());
        assert!(matches!(
            record.metadata,
            RecordMetadata::Generation { daily: 20, subscription: 20, bonus: 0, requested: 40, .. }
        ));
    }

    #[test]
    fn subscription_reset_delta_can_be_negative() {
        let user = UserId::generate();
        // Downgrade: pool held 2000, new tier limit is 500.
        let record =
            CreditRecord::subscription_reset(user, 500 - 2000, 2100, SubscriptionTier::Starter, None);
        assert_eq!(record.amount, -1500);
        assert_eq!(record.balance_after, 600);
        assert!(record.is_balanced());
    }

    #[test]
    fn record_type_serializes_snake_case() {
        let json = serde_json::to_string(&RecordType::ReferralInviter).unwrap();
        assert_eq!(json, "\"referral_inviter\"");
        let json = serde_json::to_string(&CreditPool::Mixed).unwrap();
        assert_eq!(json, "\"mixed\"");
    }

    #[test]
    fn metadata_roundtrips_through_json() {
        let metadata = RecordMetadata::AdminGrant {
            admin_id: UserId::generate(),
            reason: "goodwill".into(),
        };
        let json = serde_json::to_string(&metadata).unwrap();
        let parsed: RecordMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(metadata, parsed);
    }
}
