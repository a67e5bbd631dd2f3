//! `RocksDB` storage layer for the tally credit ledger.
//!
//! This crate provides persistent storage for wallets, audit records,
//! orders, and referrals using `RocksDB` with column families for
//! efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `wallets`: Wallet rows, keyed by `user_id`
//! - `records`: Audit ledger records, keyed by `record_id` (ULID)
//! - `records_by_user`: Index for listing a user's audit trail
//! - `orders`: Purchase orders, keyed by provider session id
//! - `referrals`: Referrals, keyed by referred user id
//! - `referrals_by_ip`: Index for the per-IP daily referral count
//!
//! # Atomicity
//!
//! All mutations flow through [`Store::commit`], which writes an entire
//! [`LedgerCommit`] (wallets, records, optional order and referral) as a
//! single `RocksDB` `WriteBatch`. The two uniqueness constraints of the
//! ledger (one order per provider session id, one referral per referred
//! user) are enforced inside `commit`, so a caller either gets the whole
//! mutation or none of it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use tally_core::{CreditRecord, Order, RecordId, Referral, UserId, Wallet};

/// An atomic unit of ledger mutation.
///
/// The balance engine assembles one of these per operation and hands it
/// to [`Store::commit`]. A commit may carry up to two wallets (a referral
/// touches both parties) and any number of audit records.
#[derive(Debug, Clone, Default)]
pub struct LedgerCommit {
    /// Wallet rows to upsert.
    pub wallets: Vec<Wallet>,

    /// Audit records to append.
    pub records: Vec<CreditRecord>,

    /// Order to insert; rejected with [`StoreError::DuplicateOrder`] if
    /// the session id already exists.
    pub order: Option<Order>,

    /// Referral to insert; rejected with [`StoreError::ReferralExists`]
    /// if the referred user already has one.
    pub referral: Option<Referral>,
}

impl LedgerCommit {
    /// Create a commit updating a single wallet.
    #[must_use]
    pub fn wallet(wallet: Wallet) -> Self {
        Self {
            wallets: vec![wallet],
            ..Self::default()
        }
    }

    /// Append an audit record to the commit.
    #[must_use]
    pub fn with_record(mut self, record: CreditRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Attach an order insert to the commit.
    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Attach a referral insert to the commit.
    #[must_use]
    pub fn with_referral(mut self, referral: Referral) -> Self {
        self.referral = Some(referral);
        self
    }
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations behind the balance engine.
pub trait Store: Send + Sync {
    // =========================================================================
    // Wallet Operations
    // =========================================================================

    /// Get a wallet by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>>;

    // =========================================================================
    // Audit Record Operations
    // =========================================================================

    /// Get an audit record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_record(&self, record_id: &RecordId) -> Result<Option<CreditRecord>>;

    /// List audit records for a user, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_records_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditRecord>>;

    // =========================================================================
    // Order Operations (idempotency)
    // =========================================================================

    /// Get an order by provider session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_order(&self, session_id: &str) -> Result<Option<Order>>;

    // =========================================================================
    // Referral Operations
    // =========================================================================

    /// Get the referral for a referred user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_referral_by_referred(&self, referred_id: &UserId) -> Result<Option<Referral>>;

    /// Count referral completions from a client IP at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_referrals_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<u64>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Write an entire [`LedgerCommit`] atomically.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateOrder`] if the commit carries an order
    ///   whose session id already exists. Nothing is written.
    /// - [`StoreError::ReferralExists`] if the commit carries a referral
    ///   for an already-referred user. Nothing is written.
    /// - [`StoreError::Database`] / [`StoreError::Serialization`] on
    ///   storage failures; the batch is all-or-nothing.
    fn commit(&self, commit: LedgerCommit) -> Result<()>;
}
