//! Core types and pure logic for the tally credit ledger.
//!
//! This crate provides the foundational types used throughout the tally
//! platform:
//!
//! - **Identifiers**: `UserId`, `RecordId`
//! - **Wallets**: `Wallet`, `SubscriptionTier`, pool deduction
//! - **Audit ledger**: `CreditRecord`, `RecordType`, `CreditPool`
//! - **Idempotency**: `Order` (provider checkout sessions)
//! - **Referrals**: `Referral`, reward and anti-fraud constants
//!
//! # Credit pools
//!
//! Every user has three independently tracked pools:
//!
//! - **daily** — granted by the daily login reward, expires at the next
//!   UTC day boundary (spent first)
//! - **subscription** — replaced on every renewal up to a tier-derived
//!   limit (spent second)
//! - **bonus** — purchases, referrals, admin grants; never expires
//!   (spent last)
//!
//! Credits are stored as `i64` whole units. Resets are computed on the
//! fly from UTC calendar dates rather than by a scheduler; see
//! [`needs_daily_reset`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod order;
pub mod record;
pub mod referral;
pub mod wallet;

pub use ids::{IdError, RecordId, UserId};
pub use order::Order;
pub use record::{CreditPool, CreditRecord, RecordMetadata, RecordType};
pub use referral::{
    Referral, ReferralStatus, REFERRAL_IP_DAILY_LIMIT, REFERRAL_MONTHLY_CREDIT_CAP,
    REFERRED_REWARD_CREDITS, REFERRER_REWARD_CREDITS,
};
pub use wallet::{
    needs_daily_reset, needs_monthly_rollover, subscription_credits_limit, Deduction,
    SubscriptionTier, Wallet, ADMIN_GRANT_MAX_CREDITS, DAILY_LOGIN_REWARD_CREDITS,
    MIN_RESERVE_CREDITS, SIGNUP_BONUS_CREDITS,
};
