//! Balance and withdrawal read models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::amount::Amount;

/// A user's spendable balance and lifetime withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub current: Amount,
    pub withdrawn: Amount,
}

/// An append-only debit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    /// Order reference the points were spent against. Need not be an uploaded order.
    pub order: String,
    pub sum: Amount,
    pub processed_at: DateTime<Utc>,
}
