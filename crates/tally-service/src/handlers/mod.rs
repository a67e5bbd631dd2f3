//! HTTP request handlers.

pub mod credits;
pub mod health;
pub mod referrals;
pub mod wallets;
pub mod webhooks;
