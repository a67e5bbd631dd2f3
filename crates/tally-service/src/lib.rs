//! Tally HTTP API Service.
//!
//! This crate provides the HTTP surface for the tally credit ledger,
//! including:
//!
//! - Wallet creation and balance reads
//! - Daily login rewards, reserve checks, and credit consumption
//! - The append-only audit trail
//! - Admin credit grants
//! - Referral redemption
//! - Payment provider webhooks
//!
//! # Authentication
//!
//! Identity verification happens upstream. The service accepts requests
//! from the API gateway carrying a service API key plus the authenticated
//! user id as an opaque header; admin endpoints require a separate admin
//! key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for routing consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
