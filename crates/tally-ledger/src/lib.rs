//! Balance engine for the tally credit ledger.
//!
//! This crate implements the operations exposed to collaborators:
//!
//! - **Balance engine**: balance reads with the implicit daily reset,
//!   daily login rewards, reserve pre-checks, priority consumption,
//!   bonus/subscription mutations, admin grants
//! - **Payment event handler**: idempotent application of provider
//!   checkout and subscription events
//! - **Referral engine**: anti-fraud referral reward application
//! - **Rate limiter**: in-memory sliding-window gate for mutation
//!   endpoints
//!
//! # Concurrency
//!
//! Every operation is synchronous read-then-write-then-return. The engine
//! serializes operations on the same user with a per-user lock map and
//! persists each mutation as one atomic store commit, so two concurrent
//! consumptions can never both read a pre-deduction balance. Operations
//! on different users never contend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod error;
mod locks;
pub mod payments;
pub mod rate_limit;
pub mod referral;

pub use engine::{BalanceSnapshot, ConsumeOutcome, LedgerEngine, ReserveCheck};
pub use error::{LedgerError, Result};
pub use payments::{PaymentEvent, PaymentEventHandler, PaymentOutcome};
pub use rate_limit::{RateDecision, RateLimiter};
pub use referral::{ReferralOutcome, RequestContext};
