//! Payment event handling.
//!
//! The handler is a thin orchestrator over the balance engine: it maps a
//! provider event onto the correct ledger mutation and delegates. The
//! provider delivers events at least once and possibly out of order; the
//! order insert (for purchases) and overwrite semantics (for subscription
//! state) keep every branch idempotent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tally_core::{SubscriptionTier, UserId};
use tally_store::Store;

use crate::engine::{BalanceSnapshot, LedgerEngine};
use crate::error::Result;

/// A payment provider event, already parsed from the wire payload.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    /// A checkout session completed: credit the purchased amount.
    CheckoutCompleted {
        /// Provider session id (the idempotency key).
        session_id: String,
        /// The purchasing user.
        user_id: UserId,
        /// Credits purchased.
        credits: i64,
    },

    /// A subscription was created, updated, or renewed.
    SubscriptionActivated {
        /// The subscribing user.
        user_id: UserId,
        /// Tier resolved from the event metadata.
        tier: SubscriptionTier,
        /// When the subscription lapses.
        expires_at: Option<DateTime<Utc>>,
    },

    /// A subscription was deleted or canceled.
    SubscriptionCanceled {
        /// The affected user.
        user_id: UserId,
    },
}

/// Result of applying a payment event.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    /// `false` when the event was a duplicate and nothing changed.
    pub applied: bool,

    /// Balance after (or unchanged by) the event.
    pub balance: BalanceSnapshot,
}

/// Applies payment provider events to the ledger.
///
/// Constructed over an injected engine so tests can substitute stores;
/// there is no module-global provider client.
pub struct PaymentEventHandler<S> {
    engine: Arc<LedgerEngine<S>>,
}

impl<S> Clone for PaymentEventHandler<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: Store> PaymentEventHandler<S> {
    /// Create a handler over the given engine.
    #[must_use]
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self { engine }
    }

    /// Apply one provider event.
    ///
    /// Duplicate deliveries are success-no-ops (`applied = false`), never
    /// errors: retried webhook delivery is expected and must not alarm
    /// the caller.
    ///
    /// # Errors
    ///
    /// - [`crate::LedgerError::UserNotFound`] if the event references a
    ///   user without a wallet.
    /// - [`crate::LedgerError::InvalidAmount`] for non-positive purchase
    ///   amounts.
    /// - [`crate::LedgerError::Storage`] on storage failure; nothing is
    ///   partially applied.
    pub fn handle(&self, event: PaymentEvent) -> Result<PaymentOutcome> {
        match event {
            PaymentEvent::CheckoutCompleted {
                session_id,
                user_id,
                credits,
            } => self.engine.apply_purchase(user_id, &session_id, credits),
            PaymentEvent::SubscriptionActivated {
                user_id,
                tier,
                expires_at,
            } => {
                let balance = self
                    .engine
                    .reset_subscription_credits(user_id, tier, expires_at)?;
                Ok(PaymentOutcome {
                    applied: true,
                    balance,
                })
            }
            PaymentEvent::SubscriptionCanceled { user_id } => {
                let balance = self.engine.cancel_subscription(user_id)?;
                Ok(PaymentOutcome {
                    applied: true,
                    balance,
                })
            }
        }
    }
}
