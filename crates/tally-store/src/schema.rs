//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Wallet rows, keyed by `user_id`.
    pub const WALLETS: &str = "wallets";

    /// Audit ledger records, keyed by `record_id` (ULID).
    pub const RECORDS: &str = "records";

    /// Index: records by user, keyed by `user_id || record_id`.
    /// Value is empty (index only).
    pub const RECORDS_BY_USER: &str = "records_by_user";

    /// Orders, keyed by provider session id (the idempotency key).
    pub const ORDERS: &str = "orders";

    /// Referrals, keyed by referred `user_id` (unique: referred once, ever).
    pub const REFERRALS: &str = "referrals";

    /// Index: referrals by client IP, keyed by
    /// `ip || 0x00 || millis_be || referred_id`. Value is empty.
    pub const REFERRALS_BY_IP: &str = "referrals_by_ip";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::WALLETS,
        cf::RECORDS,
        cf::RECORDS_BY_USER,
        cf::ORDERS,
        cf::REFERRALS,
        cf::REFERRALS_BY_IP,
    ]
}
