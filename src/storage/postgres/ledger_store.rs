//! PostgreSQL LedgerStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{LockType, PostgresQueryBuilder};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::ledger::{Amount, Balance, Order, OrderStatus, Verdict, Withdrawal};
use crate::storage::schema::POSTGRES_SCHEMA;
use crate::storage::{queries, LedgerStore, Result, StorageError, VerdictOutcome};

/// PostgreSQL implementation of LedgerStore.
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Create a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.get("status");
    let accrual: Option<i64> = row.get("accrual");

    Ok(Order {
        number: row.get("number"),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?,
        accrual: accrual.map(Amount::from_hundredths),
        uploaded_at: row.get::<DateTime<Utc>, _>("uploaded_at"),
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
impl LedgerStore for PostgresLedgerStore {
    async fn init_schema(&self) -> Result<()> {
        for statement in POSTGRES_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()> {
        let query = queries::insert_user(login, password_hash).to_string(PostgresQueryBuilder);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| login_taken(e, login))?;
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> Result<Option<String>> {
        let query = queries::select_password_hash(login).to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| row.get(0)))
    }

    async fn is_login_taken(&self, login: &str) -> Result<bool> {
        Ok(self.password_hash(login).await?.is_some())
    }

    async fn order_owner(&self, number: &str) -> Result<Option<String>> {
        let query = queries::select_order_owner(number).to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| row.get(0)))
    }

    async fn store_order(&self, number: &str, login: &str) -> Result<bool> {
        let query = queries::insert_order(number, login).to_string(PostgresQueryBuilder);
        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn orders(&self, login: &str) -> Result<Vec<Order>> {
        let query = queries::select_orders(login).to_string(PostgresQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn unsettled_orders(&self) -> Result<Vec<Order>> {
        let query = queries::select_unsettled().to_string(PostgresQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn apply_verdict(&self, verdict: &Verdict) -> Result<VerdictOutcome> {
        let mut tx = self.pool.begin().await?;

        // The status guard re-checks under the row lock taken by UPDATE.
        let query = queries::update_verdict(verdict).to_string(PostgresQueryBuilder);
        let Some(row) = sqlx::query(&query).fetch_optional(&mut *tx).await? else {
            debug!(order = %verdict.number, status = %verdict.status, "Verdict skipped");
            return Ok(VerdictOutcome::Skipped);
        };
        let owner: String = row.get(0);

        let credited = verdict.credit();
        if let Some(amount) = credited {
            let query = queries::credit_user(&owner, amount).to_string(PostgresQueryBuilder);
            let result = sqlx::query(&query).execute(&mut *tx).await?;
            if result.rows_affected() != 1 {
                return Err(StorageError::UserNotFound(owner));
            }
        }

        tx.commit().await?;
        Ok(VerdictOutcome::Applied { credited })
    }

    async fn balance(&self, login: &str) -> Result<Balance> {
        let query = queries::select_balance(login).to_string(PostgresQueryBuilder);
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

        // Row lock serializes concurrent withdrawals and credits for this user.
        let mut select = queries::select_balance(login);
        select.lock(LockType::Update);
        let query = select.to_string(PostgresQueryBuilder);
        let row = sqlx::query(&query)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::UserNotFound(login.to_string()))?;

        let balance = Amount::from_hundredths(row.get(0));
        if balance < sum {
            return Err(StorageError::InsufficientFunds {
                balance,
                requested: sum,
            });
        }

        let query = queries::debit_user(login, sum).to_string(PostgresQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        let query = queries::insert_withdrawal(login, order, sum).to_string(PostgresQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>> {
        let query = queries::select_withdrawals(login).to_string(PostgresQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| Withdrawal {
                order: row.get("order_number"),
                sum: Amount::from_hundredths(row.get("sum")),
                processed_at: row.get::<DateTime<Utc>, _>("processed_at"),
            })
            .collect())
    }
}
