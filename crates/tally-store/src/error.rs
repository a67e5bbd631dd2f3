//! Error types for tally storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// An order with this provider session id already exists
    /// (idempotency constraint).
    #[error("duplicate order: {session_id}")]
    DuplicateOrder {
        /// The provider session id that collided.
        session_id: String,
    },

    /// A referral already exists for this referred user (each user may be
    /// referred at most once).
    #[error("referral already exists for user {referred_id}")]
    ReferralExists {
        /// The referred user id that collided.
        referred_id: String,
    },
}
