//! Order lifecycle.
//!
//! ```text
//! NEW ──> PROCESSING ──> PROCESSED
//!  │          │
//!  └──────────┴────────> INVALID
//! ```
//!
//! Uploads only ever create `NEW` orders. Every other transition is driven by
//! a verdict from the accrual service. `PROCESSED` and `INVALID` are terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;

/// Internal order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

/// Statuses the reconciliation worker polls for.
pub const UNSETTLED: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Invalid | OrderStatus::Processed => 2,
        }
    }

    /// Whether an order currently in `self` may move to `next`.
    ///
    /// Re-applying the current non-terminal status is allowed so verdicts stay
    /// idempotent. Nothing leaves a terminal state, and nothing moves backwards.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    /// Statuses from which an order may move to `self`.
    ///
    /// Used by stores to guard verdict updates with a single conditional
    /// statement.
    pub fn predecessors(self) -> Vec<OrderStatus> {
        UNSETTLED
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status vocabulary of the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl From<AccrualStatus> for OrderStatus {
    fn from(status: AccrualStatus) -> Self {
        match status {
            AccrualStatus::Registered | AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

/// An uploaded order as returned to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Amount>,
    pub uploaded_at: DateTime<Utc>,
}

/// Who owns an order number, relative to the requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOwnership {
    NotPresent,
    OwnedByRequester,
    OwnedByOther,
}

/// Result of uploading an order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// New order created in `NEW`.
    Accepted,
    /// The requester already uploaded this number.
    AlreadyAccepted,
    /// Another user owns this number.
    Conflict,
}

/// A settlement decision for one order, ready to be applied to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub number: String,
    pub status: OrderStatus,
    /// Present only for `PROCESSED`.
    pub accrual: Option<Amount>,
}

impl Verdict {
    /// Build a verdict from the accrual service's vocabulary.
    ///
    /// Accrual amounts are only meaningful for `PROCESSED`; any amount sent
    /// alongside another status is dropped.
    pub fn from_accrual(number: impl Into<String>, status: AccrualStatus, accrual: Option<Amount>) -> Self {
        let status = OrderStatus::from(status);
        let accrual = match status {
            OrderStatus::Processed => accrual,
            _ => None,
        };
        Self {
            number: number.into(),
            status,
            accrual,
        }
    }

    /// Amount to credit the owner when this verdict settles the order.
    pub fn credit(&self) -> Option<Amount> {
        match (self.status, self.accrual) {
            (OrderStatus::Processed, Some(amount)) if amount.is_positive() => Some(amount),
            _ => None,
        }
    }
}
