//! Orders: the idempotency boundary with the payment provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A completed credit purchase, keyed by the provider-issued checkout
/// session id.
///
/// The session id is unique across all orders; inserting a second order
/// for the same session is rejected at the storage layer, which is the
/// sole guard against at-least-once webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Provider checkout session id (the idempotency key).
    pub session_id: String,

    /// The purchasing user.
    pub user_id: UserId,

    /// Credits granted by this purchase.
    pub credits: i64,

    /// When the order was recorded.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order stamped with the current time.
    #[must_use]
    pub fn new(session_id: String, user_id: UserId, credits: i64) -> Self {
        Self {
            session_id,
            user_id,
            credits,
            created_at: Utc::now(),
        }
    }
}
