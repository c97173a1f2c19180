//! Accrual service integration.
//!
//! - `client`: queries the external accrual service for per-order verdicts
//! - `worker`: background reconciliation of unsettled orders

pub mod client;
pub mod worker;

pub use client::{AccrualClient, AccrualError, AccrualReply, HttpAccrualClient};
pub use worker::{ReconciliationWorker, TickOutcome, WorkerConfig, WorkerHandle, WorkerState};
