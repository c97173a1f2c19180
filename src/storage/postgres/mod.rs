//! PostgreSQL implementation of the ledger store.

mod ledger_store;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub use ledger_store::PostgresLedgerStore;

use crate::utils::bootstrap::connect_with_retry;

/// Connect to PostgreSQL at `uri`.
pub async fn connect(uri: &str, max_connections: u32) -> super::Result<PostgresLedgerStore> {
    let pool = connect_with_retry("postgres", || {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(uri)
    })
    .await?;

    Ok(PostgresLedgerStore::new(pool))
}
