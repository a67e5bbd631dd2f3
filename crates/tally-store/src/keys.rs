//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families.

use chrono::{DateTime, Utc};
use tally_core::{RecordId, UserId};

/// Separator between the variable-length IP prefix and the rest of a
/// referral IP index key.
const IP_KEY_SEPARATOR: u8 = 0;

/// Create a wallet key from a user ID.
#[must_use]
pub fn wallet_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a record key from a record ID.
#[must_use]
pub fn record_key(record_id: &RecordId) -> Vec<u8> {
    record_id.to_bytes().to_vec()
}

/// Create a user-record index key.
///
/// Format: `user_id (16 bytes) || record_id (16 bytes)`
///
/// Since ULIDs are time-ordered, records for a user sort chronologically.
#[must_use]
pub fn user_record_key(user_id: &UserId, record_id: &RecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&record_id.to_bytes());
    key
}

/// Create a prefix for iterating all records for a user.
#[must_use]
pub fn user_records_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the record ID from a user-record index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_record_id_from_user_key(key: &[u8]) -> RecordId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    RecordId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an order key from a provider session id.
#[must_use]
pub fn order_key(session_id: &str) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}

/// Create a referral key from the referred user's id.
#[must_use]
pub fn referral_key(referred_id: &UserId) -> Vec<u8> {
    referred_id.as_bytes().to_vec()
}

/// Create a referral IP index key.
///
/// Format: `ip || 0x00 || created_at_millis (8 bytes, BE) || referred_id
/// (16 bytes)`
///
/// The big-endian millisecond timestamp keeps entries for one IP sorted
/// by time, so counting completions since a cutoff is a prefix scan.
#[must_use]
pub fn referral_ip_key(ip: &str, created_at: DateTime<Utc>, referred_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ip.len() + 1 + 8 + 16);
    key.extend_from_slice(ip.as_bytes());
    key.push(IP_KEY_SEPARATOR);
    key.extend_from_slice(&created_at.timestamp_millis().to_be_bytes());
    key.extend_from_slice(referred_id.as_bytes());
    key
}

/// Create a prefix for iterating all referral IP index entries for an IP.
#[must_use]
pub fn referral_ip_prefix(ip: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(ip.len() + 1);
    prefix.extend_from_slice(ip.as_bytes());
    prefix.push(IP_KEY_SEPARATOR);
    prefix
}

/// Extract the millisecond timestamp from a referral IP index key, given
/// the prefix length for the IP it was built with.
///
/// Returns `None` if the key is too short to carry a timestamp.
#[must_use]
pub fn extract_millis_from_ip_key(key: &[u8], prefix_len: usize) -> Option<i64> {
    let bytes = key.get(prefix_len..prefix_len + 8)?;
    let mut millis = [0u8; 8];
    millis.copy_from_slice(bytes);
    Some(i64::from_be_bytes(millis))
}
