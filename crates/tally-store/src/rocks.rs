//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use tally_core::{CreditRecord, Order, RecordId, Referral, UserId, Wallet};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{LedgerCommit, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cf_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Wallet Operations
    // =========================================================================

    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        self.get_cf_value(cf::WALLETS, &keys::wallet_key(user_id))
    }

    // =========================================================================
    // Audit Record Operations
    // =========================================================================

    fn get_record(&self, record_id: &RecordId) -> Result<Option<CreditRecord>> {
        self.get_cf_value(cf::RECORDS, &keys::record_key(record_id))
    }

    fn list_records_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditRecord>> {
        let cf_by_user = self.cf(cf::RECORDS_BY_USER)?;
        let prefix = keys::user_records_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // Collect all matching keys first; ULIDs are time-ordered so the
        // scan is already chronological.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        // Reverse to get newest first.
        all_keys.reverse();

        let mut records = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if records.len() >= limit {
                break;
            }

            let record_id = keys::extract_record_id_from_user_key(&key);
            if let Some(record) = self.get_record(&record_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    fn get_order(&self, session_id: &str) -> Result<Option<Order>> {
        self.get_cf_value(cf::ORDERS, &keys::order_key(session_id))
    }

    // =========================================================================
    // Referral Operations
    // =========================================================================

    fn get_referral_by_referred(&self, referred_id: &UserId) -> Result<Option<Referral>> {
        self.get_cf_value(cf::REFERRALS, &keys::referral_key(referred_id))
    }

    fn count_referrals_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<u64> {
        let cf_by_ip = self.cf(cf::REFERRALS_BY_IP)?;
        let prefix = keys::referral_ip_prefix(ip);
        let since_millis = since.timestamp_millis();

        let iter = self.db.iterator_cf(
            &cf_by_ip,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut count = 0;
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            match keys::extract_millis_from_ip_key(&key, prefix.len()) {
                Some(millis) if millis >= since_millis => count += 1,
                _ => {}
            }
        }

        Ok(count)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn commit(&self, commit: LedgerCommit) -> Result<()> {
        // Uniqueness constraints are checked here, against the live
        // database, immediately before the batch is written. The engine
        // serializes same-user operations, so a duplicate detected here
        // is an idempotency collision, not a race.
        if let Some(order) = &commit.order {
            if self.get_order(&order.session_id)?.is_some() {
                return Err(StoreError::DuplicateOrder {
                    session_id: order.session_id.clone(),
                });
            }
        }

        if let Some(referral) = &commit.referral {
            if self
                .get_referral_by_referred(&referral.referred_id)?
                .is_some()
            {
                return Err(StoreError::ReferralExists {
                    referred_id: referral.referred_id.to_string(),
                });
            }
        }

        let cf_wallets = self.cf(cf::WALLETS)?;
        let cf_records = self.cf(cf::RECORDS)?;
        let cf_records_by_user = self.cf(cf::RECORDS_BY_USER)?;
        let cf_orders = self.cf(cf::ORDERS)?;
        let cf_referrals = self.cf(cf::REFERRALS)?;
        let cf_referrals_by_ip = self.cf(cf::REFERRALS_BY_IP)?;

        let mut batch = WriteBatch::default();

        for wallet in &commit.wallets {
            let key = keys::wallet_key(&wallet.user_id);
            batch.put_cf(&cf_wallets, key, Self::serialize(wallet)?);
        }

        for record in &commit.records {
            let record_key = keys::record_key(&record.id);
            let user_record_key = keys::user_record_key(&record.user_id, &record.id);
            batch.put_cf(&cf_records, &record_key, Self::serialize(record)?);
            batch.put_cf(&cf_records_by_user, &user_record_key, []);
        }

        if let Some(order) = &commit.order {
            let key = keys::order_key(&order.session_id);
            batch.put_cf(&cf_orders, key, Self::serialize(order)?);
        }

        if let Some(referral) = &commit.referral {
            let key = keys::referral_key(&referral.referred_id);
            let ip_key = keys::referral_ip_key(
                &referral.ip_address,
                referral.created_at,
                &referral.referred_id,
            );
            batch.put_cf(&cf_referrals, key, Self::serialize(referral)?);
            batch.put_cf(&cf_referrals_by_ip, ip_key, []);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
