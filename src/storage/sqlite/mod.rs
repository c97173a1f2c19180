//! SQLite implementation of the ledger store.

mod ledger_store;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub use ledger_store::SqliteLedgerStore;

use crate::utils::bootstrap::connect_with_retry;

/// Open (creating if missing) the SQLite database at `path`.
///
/// `path` may be a plain filename or a `sqlite:` URL.
pub async fn connect(path: &str, max_connections: u32) -> super::Result<SqliteLedgerStore> {
    let opts = if path.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(path)?
    } else {
        SqliteConnectOptions::new().filename(path)
    }
    .journal_mode(SqliteJournalMode::Wal)
    .busy_timeout(Duration::from_secs(30))
    .foreign_keys(true)
    .create_if_missing(true);

    let pool = connect_with_retry("sqlite", || {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts.clone())
    })
    .await?;

    Ok(SqliteLedgerStore::new(pool))
}
