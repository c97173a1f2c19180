//! Mock storage implementation for testing.

mod ledger_store;

pub use ledger_store::MockLedgerStore;
