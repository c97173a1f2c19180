//! Loyalty points ledger.
//!
//! Users upload order numbers, a background worker reconciles them against
//! an external accrual service, and credited points can be withdrawn.

pub mod accrual;
pub mod api;
pub mod auth;
pub mod config;
pub mod ledger;
pub mod storage;
pub mod utils;
