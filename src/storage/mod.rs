//! Ledger storage.
//!
//! The `LedgerStore` trait is the only serialization point between request
//! handlers and the reconciliation worker. Every multi-row mutation (verdict +
//! credit, balance check + debit + withdrawal record) is a single transaction
//! inside the implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::ledger::{Amount, Balance, Order, OrderOwnership, Verdict, Withdrawal};

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod schema;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod queries;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(test)]
pub mod mock;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedgerStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresLedgerStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Login already taken: {0}")]
    LoginTaken(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient funds: balance={balance}, requested={requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What applying a verdict did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictOutcome {
    /// Status and accrual written; `credited` is the amount added to the
    /// owner's balance in the same transaction.
    Applied { credited: Option<Amount> },
    /// Order missing or already settled; nothing changed.
    Skipped,
}

/// Interface for ledger persistence.
///
/// Implementations:
/// - `SqliteLedgerStore`: SQLite storage
/// - `PostgresLedgerStore`: PostgreSQL storage
/// - `MockLedgerStore`: in-memory, tests only
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create tables and indexes if they do not exist.
    async fn init_schema(&self) -> Result<()>;

    /// Insert a new user with a zero balance.
    ///
    /// Fails with `LoginTaken` when the login exists.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()>;

    /// Stored credential hash for `login`, if the user exists.
    async fn password_hash(&self, login: &str) -> Result<Option<String>>;

    async fn is_login_taken(&self, login: &str) -> Result<bool>;

    /// Login owning `number`, if the order exists.
    async fn order_owner(&self, number: &str) -> Result<Option<String>>;

    /// Insert a `NEW` order owned by `login`.
    ///
    /// Returns `false` without error when the number already exists; the
    /// unique constraint on the order number arbitrates concurrent uploads.
    async fn store_order(&self, number: &str, login: &str) -> Result<bool>;

    /// Orders owned by `login`, newest upload first.
    async fn orders(&self, login: &str) -> Result<Vec<Order>>;

    /// Orders in `NEW` or `PROCESSING`, oldest upload first.
    async fn unsettled_orders(&self) -> Result<Vec<Order>>;

    /// Atomically set status and accrual, crediting the owner for a positive
    /// `PROCESSED` accrual in the same transaction.
    ///
    /// Verdicts for missing or already settled orders are skipped.
    async fn apply_verdict(&self, verdict: &Verdict) -> Result<VerdictOutcome>;

    async fn balance(&self, login: &str) -> Result<Balance>;

    /// Debit `sum` from `login` and append a withdrawal record.
    ///
    /// The sufficiency check and the mutation are one atomic unit per user.
    async fn withdraw(&self, login: &str, order: &str, sum: Amount) -> Result<()>;

    /// Withdrawals by `login`, newest first.
    async fn withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>>;

    /// Resolve ownership of `number` relative to `login`.
    async fn check_order_owner(&self, number: &str, login: &str) -> Result<OrderOwnership> {
        Ok(match self.order_owner(number).await? {
            None => OrderOwnership::NotPresent,
            Some(owner) if owner == login => OrderOwnership::OwnedByRequester,
            Some(_) => OrderOwnership::OwnedByOther,
        })
    }
}

/// Initialize storage based on configuration.
///
/// Connects with retry, then creates the schema. Any failure here is fatal
/// to startup.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Arc<dyn LedgerStore>, Box<dyn std::error::Error>> {
    let storage_type = config.storage_type;
    info!(storage = ?storage_type, "Initializing ledger storage");

    let store: Arc<dyn LedgerStore> = match storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let store = sqlite::connect(&config.sqlite.path, config.max_connections).await?;
            Arc::new(store)
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            let store = postgres::connect(&config.postgres.uri, config.max_connections).await?;
            Arc::new(store)
        }
        #[allow(unreachable_patterns)]
        other => {
            error!(storage = ?other, "Storage backend requested but its feature is not enabled");
            return Err(format!("{:?} storage feature not enabled", other).into());
        }
    };

    store.init_schema().await?;
    Ok(store)
}
