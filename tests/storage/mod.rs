//! Shared storage integration tests.
//!
//! Each backend's test binary declares `mod storage;` and invokes
//! `run_ledger_store_tests!` against a freshly initialized store.

pub mod ledger_store_tests;
