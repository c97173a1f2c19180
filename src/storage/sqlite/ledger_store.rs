//! SQLite LedgerStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::SqliteQueryBuilder;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::ledger::{Amount, Balance, Order, OrderStatus, Verdict, Withdrawal};
use crate::storage::schema::SQLITE_SCHEMA;
use crate::storage::{queries, LedgerStore, Result, StorageError, VerdictOutcome};

/// SQLite implementation of LedgerStore.
///
/// Every mutating transaction opens with a write so SQLite takes the write
/// lock up front instead of upgrading a shared lock mid-transaction.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new SQLite ledger store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

fn order_from_row(row: &SqliteRow) -> Result<Order> {
    let status: String = row.get("status");
    let accrual: Option<i64> = row.get("accrual");
    let uploaded_at: String = row.get("uploaded_at");

    Ok(Order {
        number: row.get("number"),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?,
        accrual: accrual.map(Amount::from_hundredths),
        uploaded_at: parse_timestamp(&uploaded_at)?,
    })
}

fn login_taken(err: sqlx::Error, login: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::LoginTaken(login.to_string())
        }
        _ => err.into(),
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn init_schema(&self) -> Result<()> {
        for statement in SQLITE_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()> {
        let query = queries::insert_user(login, password_hash).to_string(SqliteQueryBuilder);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| login_taken(e, login))?;
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> Result<Option<String>> {
        let query = queries::select_password_hash(login).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| row.get(0)))
    }

    async fn is_login_taken(&self, login: &str) -> Result<bool> {
        Ok(self.password_hash(login).await?.is_some())
    }

    async fn order_owner(&self, number: &str) -> Result<Option<String>> {
        let query = queries::select_order_owner(number).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| row.get(0)))
    }

    async fn store_order(&self, number: &str, login: &str) -> Result<bool> {
        let query = queries::insert_order(number, login).to_string(SqliteQueryBuilder);
        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn orders(&self, login: &str) -> Result<Vec<Order>> {
        let query = queries::select_orders(login).to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn unsettled_orders(&self) -> Result<Vec<Order>> {
        let query = queries::select_unsettled().to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn apply_verdict(&self, verdict: &Verdict) -> Result<VerdictOutcome> {
        let mut tx = self.pool.begin().await?;

        let query = queries::update_verdict(verdict).to_string(SqliteQueryBuilder);
        let Some(row) = sqlx::query(&query).fetch_optional(&mut *tx).await? else {
            debug!(order = %verdict.number, status = %verdict.status, "Verdict skipped");
            return Ok(VerdictOutcome::Skipped);
        };
        let owner: String = row.get(0);

        let credited = verdict.credit();
        if let Some(amount) = credited {
            let query = queries::credit_user(&owner, amount).to_string(SqliteQueryBuilder);
            let result = sqlx::query(&query).execute(&mut *tx).await?;
            if result.rows_affected() != 1 {
                return Err(StorageError::UserNotFound(owner));
            }
        }

        tx.commit().await?;
        Ok(VerdictOutcome::Applied { credited })
    }

    async fn balance(&self, login: &str) -> Result<Balance> {
        let query = queries::select_balance(login).to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::UserNotFound(login.to_string()))?;

        Ok(Balance {
            current: Amount::from_hundredths(row.get(0)),
            withdrawn: Amount::from_hundredths(row.get(1)),
        })
    }

    async fn withdraw(&self, login: &str, order: &str, sum: Amount) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let query = queries::debit_user(login, sum).to_string(SqliteQueryBuilder);
        let debited = sqlx::query(&query).execute(&mut *tx).await?;

        if debited.rows_affected() == 0 {
            let query = queries::select_balance(login).to_string(SqliteQueryBuilder);
            return match sqlx::query(&query).fetch_optional(&mut *tx).await? {
                None => Err(StorageError::UserNotFound(login.to_string())),
                Some(row) => Err(StorageError::InsufficientFunds {
                    balance: Amount::from_hundredths(row.get(0)),
                    requested: sum,
                }),
            };
        }

        let query = queries::insert_withdrawal(login, order, sum).to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>> {
        let query = queries::select_withdrawals(login).to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let processed_at: String = row.get("processed_at");
                Ok(Withdrawal {
                    order: row.get("order_number"),
                    sum: Amount::from_hundredths(row.get("sum")),
                    processed_at: parse_timestamp(&processed_at)?,
                })
            })
            .collect()
    }
}
