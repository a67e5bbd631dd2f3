//! The balance engine.
//!
//! All operations here follow the same shape: take the user's lock, read
//! the wallet, apply the implicit daily reset, mutate, and persist wallet
//! plus audit records as one atomic store commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tally_core::{
    subscription_credits_limit, CreditRecord, Order, SubscriptionTier, UserId, Wallet,
    ADMIN_GRANT_MAX_CREDITS, DAILY_LOGIN_REWARD_CREDITS, MIN_RESERVE_CREDITS,
    SIGNUP_BONUS_CREDITS,
};
use tally_store::{LedgerCommit, Store, StoreError};

use crate::error::{LedgerError, Result};
use crate::locks::{acquire, UserLocks};
use crate::payments::PaymentOutcome;

/// The balance engine.
///
/// Thin orchestrators (payment event handler, referral engine, HTTP
/// handlers) delegate to these operations; the engine owns every wallet
/// mutation.
pub struct LedgerEngine<S> {
    store: Arc<S>,
    pub(crate) locks: UserLocks,
}

/// A point-in-time view of a wallet's pools.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSnapshot {
    /// The wallet owner.
    pub user_id: UserId,

    /// Daily login pool balance.
    pub daily_credits: i64,

    /// Subscription pool balance.
    pub subscription_credits: i64,

    /// Bonus pool balance.
    pub bonus_credits: i64,

    /// Subscription pool limit derived from the effective tier (zero once
    /// the subscription has lapsed).
    pub subscription_limit: i64,

    /// Sum of all three pools.
    pub total_available: i64,

    /// Tier after accounting for expiry.
    pub tier: SubscriptionTier,
}

/// Result of a [`LedgerEngine::consume`] call.
///
/// A shortfall is not an error: the call succeeds with the smaller
/// `consumed` and callers that need a hard minimum use
/// [`LedgerEngine::check_reserve`] first.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeOutcome {
    /// The cost the caller asked for.
    pub requested: i64,

    /// Credits actually deducted across the pools.
    pub consumed: i64,

    /// `requested - consumed`; zero unless funds ran short.
    pub shortfall: i64,

    /// Balance after the deduction.
    pub balance: BalanceSnapshot,
}

/// Result of a [`LedgerEngine::check_reserve`] call.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveCheck {
    /// Whether the balance meets the minimum reserve.
    pub allowed: bool,

    /// Current total balance.
    pub available: i64,

    /// The reserve threshold.
    pub required: i64,
}

impl<S: Store> LedgerEngine<S> {
    /// Create a new engine over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn load_wallet(&self, user_id: UserId) -> Result<Wallet> {
        self.store
            .get_wallet(&user_id)?
            .ok_or(LedgerError::UserNotFound { user_id })
    }

    pub(crate) fn snapshot(wallet: &Wallet, now: DateTime<Utc>) -> BalanceSnapshot {
        BalanceSnapshot {
            user_id: wallet.user_id,
            daily_credits: wallet.daily_credits,
            subscription_credits: wallet.subscription_credits,
            bonus_credits: wallet.bonus_credits,
            subscription_limit: subscription_credits_limit(
                wallet.tier,
                wallet.subscription_expires_at,
                now,
            ),
            total_available: wallet.total_available(),
            tier: wallet.effective_tier(now),
        }
    }

    /// Create a wallet for a new user, granting the signup bonus.
    ///
    /// Idempotent: if the wallet already exists, returns its current
    /// balance without granting a second bonus.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn create_wallet(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        if let Some(existing) = self.store.get_wallet(&user_id)? {
            return Ok(Self::snapshot(&existing, now));
        }

        let mut wallet = Wallet::new(user_id, now);
        wallet.bonus_credits = SIGNUP_BONUS_CREDITS;
        let record = CreditRecord::signup_bonus(user_id, SIGNUP_BONUS_CREDITS, 0);

        self.store
            .commit(LedgerCommit::wallet(wallet.clone()).with_record(record))?;

        tracing::info!(user_id = %user_id, bonus = SIGNUP_BONUS_CREDITS, "wallet created");

        Ok(Self::snapshot(&wallet, now))
    }

    /// Read the wallet's balance, applying the daily reset as a side
    /// effect when the stamp is stale.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn get_balance(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        if wallet.apply_daily_reset(now) {
            wallet.touch(now);
            self.store.commit(LedgerCommit::wallet(wallet.clone()))?;
        }

        Ok(Self::snapshot(&wallet, now))
    }

    /// Grant the daily login reward, at most once per UTC day.
    ///
    /// A repeated call within the same day is a no-op returning the
    /// current balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn grant_daily_login(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;

        if !tally_core::needs_daily_reset(wallet.daily_reset_at, now) {
            tracing::debug!(user_id = %user_id, "daily reward already granted today");
            return Ok(Self::snapshot(&wallet, now));
        }

        wallet.apply_daily_reset(now);
        let balance_before = wallet.total_available();
        wallet.daily_credits = DAILY_LOGIN_REWARD_CREDITS;
        wallet.touch(now);

        let record =
            CreditRecord::daily_login(user_id, DAILY_LOGIN_REWARD_CREDITS, balance_before);
        self.store
            .commit(LedgerCommit::wallet(wallet.clone()).with_record(record))?;

        tracing::info!(
            user_id = %user_id,
            reward = DAILY_LOGIN_REWARD_CREDITS,
            "daily login reward granted"
        );

        Ok(Self::snapshot(&wallet, now))
    }

    /// Check whether the balance meets the minimum reserve for starting a
    /// billable operation whose cost is not known in advance.
    ///
    /// Read-only apart from the daily-reset side effect.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn check_reserve(&self, user_id: UserId) -> Result<ReserveCheck> {
        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        if wallet.apply_daily_reset(now) {
            wallet.touch(now);
            self.store.commit(LedgerCommit::wallet(wallet.clone()))?;
        }

        let available = wallet.total_available();
        Ok(ReserveCheck {
            allowed: available >= MIN_RESERVE_CREDITS,
            available,
            required: MIN_RESERVE_CREDITS,
        })
    }

    /// Deduct up to `cost` credits, daily pool first, then subscription,
    /// then bonus.
    ///
    /// When funds run short the call still succeeds with the smaller
    /// `consumed` (partial consumption); the shortfall is logged. A
    /// `generation` audit record is appended only when something was
    /// actually deducted.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `cost` is negative.
    /// - [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn consume(
        &self,
        user_id: UserId,
        cost: i64,
        context: Option<String>,
    ) -> Result<ConsumeOutcome> {
        if cost < 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "cost must be non-negative, got {cost}"
            )));
        }

        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        let reset = wallet.apply_daily_reset(now);

        let balance_before = wallet.total_available();
        let deduction = wallet.deduct(cost);
        let consumed = deduction.total();

        if consumed > 0 {
            wallet.touch(now);
            let record = CreditRecord::generation(
                user_id,
                consumed,
                balance_before,
                cost,
                deduction,
                context,
            );
            self.store
                .commit(LedgerCommit::wallet(wallet.clone()).with_record(record))?;
        } else if reset {
            wallet.touch(now);
            self.store.commit(LedgerCommit::wallet(wallet.clone()))?;
        }

        if consumed < cost {
            tracing::warn!(
                user_id = %user_id,
                requested = cost,
                consumed,
                "consumption shortfall"
            );
        }

        Ok(ConsumeOutcome {
            requested: cost,
            consumed,
            shortfall: cost - consumed,
            balance: Self::snapshot(&wallet, now),
        })
    }

    /// Add credits to the bonus pool unconditionally.
    ///
    /// This is the raw additive primitive; the purchase, referral, and
    /// admin paths append their own audit records atomically with the
    /// wallet update instead of calling this.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is negative.
    /// - [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn add_bonus_credits(&self, user_id: UserId, amount: i64) -> Result<BalanceSnapshot> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "amount must be non-negative, got {amount}"
            )));
        }

        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        wallet.apply_daily_reset(now);
        wallet.bonus_credits += amount;
        wallet.touch(now);

        self.store.commit(LedgerCommit::wallet(wallet.clone()))?;

        Ok(Self::snapshot(&wallet, now))
    }

    /// Replace the subscription pool with the tier's limit and stamp the
    /// new tier and expiry.
    ///
    /// Overwrites rather than adds: a renewal does not stack leftover
    /// credits. Appends a `subscription_reset` record carrying the delta.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn reset_subscription_credits(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BalanceSnapshot> {
        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        wallet.apply_daily_reset(now);

        let balance_before = wallet.total_available();
        let delta = tier.credits_limit() - wallet.subscription_credits;
        wallet.subscription_credits = tier.credits_limit();
        wallet.subscription_reset_at = Some(now);
        wallet.tier = tier;
        wallet.subscription_expires_at = expires_at;
        wallet.touch(now);

        let record =
            CreditRecord::subscription_reset(user_id, delta, balance_before, tier, expires_at);
        self.store
            .commit(LedgerCommit::wallet(wallet.clone()).with_record(record))?;

        tracing::info!(
            user_id = %user_id,
            tier = tier.as_str(),
            credits = tier.credits_limit(),
            "subscription credits reset"
        );

        Ok(Self::snapshot(&wallet, now))
    }

    /// Downgrade to the free tier: zero the subscription pool and clear
    /// the subscription timestamps.
    ///
    /// No audit record is written; cancellation is a state transition,
    /// not a credit delta of interest to the user-facing ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn cancel_subscription(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        wallet.apply_daily_reset(now);
        wallet.subscription_credits = 0;
        wallet.subscription_reset_at = None;
        wallet.tier = SubscriptionTier::Free;
        wallet.subscription_expires_at = None;
        wallet.touch(now);

        self.store.commit(LedgerCommit::wallet(wallet.clone()))?;

        tracing::info!(user_id = %user_id, "subscription canceled");

        Ok(Self::snapshot(&wallet, now))
    }

    /// Apply a completed checkout session to the bonus pool.
    ///
    /// Idempotent under at-least-once delivery: the order insert is the
    /// sole guard, enforced at the storage layer. A duplicate session id
    /// is a success-no-op with `applied = false`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `credits` is not positive.
    /// - [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn apply_purchase(
        &self,
        user_id: UserId,
        session_id: &str,
        credits: i64,
    ) -> Result<PaymentOutcome> {
        if credits <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "purchase credits must be positive, got {credits}"
            )));
        }

        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        if self.store.get_order(session_id)?.is_some() {
            tracing::info!(session_id, user_id = %user_id, "duplicate purchase event ignored");
            let wallet = self.load_wallet(user_id)?;
            return Ok(PaymentOutcome {
                applied: false,
                balance: Self::snapshot(&wallet, now),
            });
        }

        let mut wallet = self.load_wallet(user_id)?;
        wallet.apply_daily_reset(now);

        let balance_before = wallet.total_available();
        wallet.bonus_credits += credits;
        wallet.touch(now);

        let record =
            CreditRecord::purchase(user_id, credits, balance_before, session_id.to_string());
        let commit = LedgerCommit::wallet(wallet.clone())
            .with_record(record)
            .with_order(Order::new(session_id.to_string(), user_id, credits));

        match self.store.commit(commit) {
            Ok(()) => {
                tracing::info!(
                    session_id,
                    user_id = %user_id,
                    credits,
                    "purchase credited"
                );
                Ok(PaymentOutcome {
                    applied: true,
                    balance: Self::snapshot(&wallet, now),
                })
            }
            Err(StoreError::DuplicateOrder { .. }) => {
                tracing::info!(session_id, user_id = %user_id, "duplicate purchase event ignored");
                let wallet = self.load_wallet(user_id)?;
                Ok(PaymentOutcome {
                    applied: false,
                    balance: Self::snapshot(&wallet, now),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Manually grant bonus credits to a user.
    ///
    /// Emits a structured audit event (actor, target, amount, reason)
    /// separate from the financial ledger record.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is outside
    ///   `1..=100_000`.
    /// - [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn grant_credits(
        &self,
        admin_id: UserId,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> Result<BalanceSnapshot> {
        if !(1..=ADMIN_GRANT_MAX_CREDITS).contains(&amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "grant amount must be in 1..={ADMIN_GRANT_MAX_CREDITS}, got {amount}"
            )));
        }

        let handle = self.locks.handle(user_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut wallet = self.load_wallet(user_id)?;
        wallet.apply_daily_reset(now);

        let balance_before = wallet.total_available();
        wallet.bonus_credits += amount;
        wallet.touch(now);

        let record = CreditRecord::admin_grant(
            user_id,
            amount,
            balance_before,
            admin_id,
            reason.to_string(),
        );
        self.store
            .commit(LedgerCommit::wallet(wallet.clone()).with_record(record))?;

        tracing::info!(
            actor = %admin_id,
            target = %user_id,
            amount,
            reason,
            timestamp = %now,
            "admin credit grant"
        );

        Ok(Self::snapshot(&wallet, now))
    }

    /// List a user's audit trail, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] if no wallet exists.
    pub fn list_records(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditRecord>> {
        self.load_wallet(user_id)?;
        Ok(self.store.list_records_by_user(&user_id, limit, offset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_core::{RecordType, SIGNUP_BONUS_CREDITS};
    use tally_store::RocksStore;
    use tempfile::TempDir;

    fn test_engine() -> (Arc<RocksStore>, LedgerEngine<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let engine = LedgerEngine::new(Arc::clone(&store));
        (store, engine, dir)
    }

    /// Write a wallet with specific pool balances straight to the store.
    fn seed_wallet(store: &RocksStore, wallet: &Wallet) {
        store.commit(LedgerCommit::wallet(wallet.clone())).unwrap();
    }

    fn funded_wallet(user_id: UserId, daily: i64, subscription: i64, bonus: i64) -> Wallet {
        let now = Utc::now();
        let mut wallet = Wallet::new(user_id, now);
        wallet.daily_credits = daily;
        wallet.daily_reset_at = Some(now);
        wallet.subscription_credits = subscription;
        wallet.bonus_credits = bonus;
        wallet
    }

    #[test]
    fn create_wallet_grants_signup_bonus_once() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();

        let balance = engine.create_wallet(user).unwrap();
        assert_eq!(balance.bonus_credits, SIGNUP_BONUS_CREDITS);
        assert_eq!(balance.total_available, SIGNUP_BONUS_CREDITS);

        // Second call is a no-op.
        let balance = engine.create_wallet(user).unwrap();
        assert_eq!(balance.bonus_credits, SIGNUP_BONUS_CREDITS);

        let records = store.list_records_by_user(&user, 10, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, RecordType::SignupBonus);
    }

    #[test]
    fn missing_wallet_is_user_not_found() {
        let (_store, engine, _dir) = test_engine();
        let user = UserId::generate();

        assert!(matches!(
            engine.get_balance(user),
            Err(LedgerError::UserNotFound { .. })
        ));
        assert!(matches!(
            engine.consume(user, 5, None),
            Err(LedgerError::UserNotFound { .. })
        ));
    }

    #[test]
    fn consume_spends_daily_then_subscription_then_bonus() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 20, 30, 50));

        let outcome = engine.consume(user, 40, Some("render".into())).unwrap();

        assert_eq!(outcome.consumed, 40);
        assert_eq!(outcome.shortfall, 0);
        assert_eq!(outcome.balance.daily_credits, 0);
        assert_eq!(outcome.balance.subscription_credits, 10);
        assert_eq!(outcome.balance.bonus_credits, 50);
    }

    #[test]
    fn consume_shortfall_succeeds_partially() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 3, 0, 1));

        let outcome = engine.consume(user, 10, None).unwrap();

        assert_eq!(outcome.consumed, 4);
        assert_eq!(outcome.shortfall, 6);
        assert_eq!(outcome.balance.total_available, 0);

        // Pools never go negative, even on repeat.
        let outcome = engine.consume(user, 10, None).unwrap();
        assert_eq!(outcome.consumed, 0);
        assert_eq!(outcome.balance.total_available, 0);
    }

    #[test]
    fn consume_zero_cost_writes_no_record() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, 10));

        let outcome = engine.consume(user, 0, None).unwrap();
        assert_eq!(outcome.consumed, 0);
        assert!(store.list_records_by_user(&user, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn consume_negative_cost_rejected() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, 10));

        assert!(matches!(
            engine.consume(user, -1, None),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn every_record_is_balanced() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        let admin = UserId::generate();

        engine.create_wallet(user).unwrap();
        engine.grant_daily_login(user).unwrap();
        engine.grant_credits(admin, user, 100, "load test").unwrap();
        engine.consume(user, 60, None).unwrap();
        engine
            .reset_subscription_credits(user, SubscriptionTier::Starter, None)
            .unwrap();

        let records = store.list_records_by_user(&user, 50, 0).unwrap();
        assert!(records.len() >= 5);
        for record in &records {
            assert!(record.is_balanced(), "unbalanced record: {record:?}");
        }
    }

    #[test]
    fn daily_login_granted_once_per_day() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        engine.create_wallet(user).unwrap();

        let first = engine.grant_daily_login(user).unwrap();
        assert_eq!(first.daily_credits, DAILY_LOGIN_REWARD_CREDITS);

        let second = engine.grant_daily_login(user).unwrap();
        assert_eq!(second.daily_credits, DAILY_LOGIN_REWARD_CREDITS);
        assert_eq!(second.total_available, first.total_available);

        let logins = store
            .list_records_by_user(&user, 50, 0)
            .unwrap()
            .into_iter()
            .filter(|r| r.record_type == RecordType::DailyLogin)
            .count();
        assert_eq!(logins, 1);
    }

    #[test]
    fn stale_daily_pool_zeroed_on_read() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();

        let mut wallet = funded_wallet(user, 15, 0, 40);
        wallet.daily_reset_at = Some(Utc::now() - Duration::days(1));
        seed_wallet(&store, &wallet);

        let balance = engine.get_balance(user).unwrap();
        assert_eq!(balance.daily_credits, 0);
        assert_eq!(balance.total_available, 40);

        // The reset was persisted, not just computed.
        let stored = store.get_wallet(&user).unwrap().unwrap();
        assert_eq!(stored.daily_credits, 0);
    }

    #[test]
    fn stale_daily_pool_not_spendable() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();

        let mut wallet = funded_wallet(user, 15, 0, 5);
        wallet.daily_reset_at = Some(Utc::now() - Duration::days(2));
        seed_wallet(&store, &wallet);

        let outcome = engine.consume(user, 10, None).unwrap();
        assert_eq!(outcome.consumed, 5);
        assert_eq!(outcome.balance.total_available, 0);
    }

    #[test]
    fn check_reserve_thresholds() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, MIN_RESERVE_CREDITS));

        let check = engine.check_reserve(user).unwrap();
        assert!(check.allowed);

        engine.consume(user, 1, None).unwrap();
        let check = engine.check_reserve(user).unwrap();
        assert!(!check.allowed);
        assert_eq!(check.available, MIN_RESERVE_CREDITS - 1);
        assert_eq!(check.required, MIN_RESERVE_CREDITS);
    }

    #[test]
    fn admin_grant_validates_bounds() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        let admin = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, 0));

        assert!(matches!(
            engine.grant_credits(admin, user, 0, "zero"),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            engine.grant_credits(admin, user, ADMIN_GRANT_MAX_CREDITS + 1, "too much"),
            Err(LedgerError::InvalidAmount(_))
        ));

        let balance = engine.grant_credits(admin, user, 500, "goodwill").unwrap();
        assert_eq!(balance.bonus_credits, 500);

        let records = store.list_records_by_user(&user, 10, 0).unwrap();
        assert_eq!(records[0].record_type, RecordType::AdminGrant);
    }

    #[test]
    fn purchase_applied_exactly_once() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, 0));

        let first = engine.apply_purchase(user, "cs_500", 500).unwrap();
        assert!(first.applied);
        assert_eq!(first.balance.bonus_credits, 500);

        let second = engine.apply_purchase(user, "cs_500", 500).unwrap();
        assert!(!second.applied);
        assert_eq!(second.balance.bonus_credits, 500);

        assert!(store.get_order("cs_500").unwrap().is_some());
        let purchases = store
            .list_records_by_user(&user, 10, 0)
            .unwrap()
            .into_iter()
            .filter(|r| r.record_type == RecordType::Purchase)
            .count();
        assert_eq!(purchases, 1);
    }

    #[test]
    fn subscription_reset_overwrites_instead_of_stacking() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, 0));

        let expires = Some(Utc::now() + Duration::days(30));
        let balance = engine
            .reset_subscription_credits(user, SubscriptionTier::Pro, expires)
            .unwrap();
        assert_eq!(balance.subscription_credits, 2000);
        assert_eq!(balance.subscription_limit, 2000);

        engine.consume(user, 300, None).unwrap();

        // Renewal replaces what was left; 1700 + 2000 would be stacking.
        let balance = engine
            .reset_subscription_credits(user, SubscriptionTier::Pro, expires)
            .unwrap();
        assert_eq!(balance.subscription_credits, 2000);
    }

    #[test]
    fn cancel_clears_subscription_state() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();
        seed_wallet(&store, &funded_wallet(user, 0, 0, 80));

        engine
            .reset_subscription_credits(
                user,
                SubscriptionTier::Starter,
                Some(Utc::now() + Duration::days(30)),
            )
            .unwrap();

        let balance = engine.cancel_subscription(user).unwrap();
        assert_eq!(balance.subscription_credits, 0);
        assert_eq!(balance.subscription_limit, 0);
        assert_eq!(balance.tier, SubscriptionTier::Free);
        // Bonus credits are untouched by cancellation.
        assert_eq!(balance.bonus_credits, 80);

        let stored = store.get_wallet(&user).unwrap().unwrap();
        assert!(stored.subscription_expires_at.is_none());
        assert!(stored.subscription_reset_at.is_none());
    }

    #[test]
    fn expired_subscription_reports_free_limit() {
        let (store, engine, _dir) = test_engine();
        let user = UserId::generate();

        let mut wallet = funded_wallet(user, 0, 900, 0);
        wallet.tier = SubscriptionTier::Pro;
        wallet.subscription_expires_at = Some(Utc::now() - Duration::days(1));
        seed_wallet(&store, &wallet);

        let balance = engine.get_balance(user).unwrap();
        assert_eq!(balance.tier, SubscriptionTier::Free);
        assert_eq!(balance.subscription_limit, 0);
        // The stored pool balance is untouched by expiry.
        assert_eq!(balance.subscription_credits, 900);
    }

    #[test]
    fn list_records_requires_wallet() {
        let (_store, engine, _dir) = test_engine();
        assert!(matches!(
            engine.list_records(UserId::generate(), 10, 0),
            Err(LedgerError::UserNotFound { .. })
        ));
    }
}
