//! Loyalty ledger domain.
//!
//! Pure types (order lifecycle, amounts, balances, Luhn) plus the `Ledger`
//! service that validates requests and drives a `LedgerStore`.

pub mod amount;
pub mod balance;
pub mod luhn;
pub mod order;
mod service;

pub use amount::Amount;
pub use balance::{Balance, Withdrawal};
pub use order::{
    AccrualStatus, Order, OrderOwnership, OrderStatus, UnknownStatus, UploadOutcome, Verdict,
    UNSETTLED,
};
pub use service::{Ledger, LedgerError};
