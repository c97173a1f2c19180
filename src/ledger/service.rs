//! Ledger service.
//!
//! Every operation takes an already-authenticated login. Validation happens
//! here, before any store access; atomicity is the store's job.

use std::sync::Arc;

use tracing::{debug, info};

use super::{luhn, Amount, Balance, Order, OrderOwnership, UploadOutcome, Verdict, Withdrawal};
use crate::auth::{hash_password, verify_password};
use crate::storage::{LedgerStore, StorageError, VerdictOutcome};

/// Errors surfaced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid order number: {0:?}")]
    InvalidOrderNumber(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Amount),

    #[error("Insufficient funds: balance={balance}, requested={requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("Login already taken: {0}")]
    LoginTaken(String),

    #[error("Credential hashing failed: {0}")]
    Credentials(String),

    #[error("{operation} failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

impl LedgerError {
    fn storage(operation: &'static str) -> impl FnOnce(StorageError) -> LedgerError {
        move |source| LedgerError::Storage { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Loyalty ledger operations over a shared store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn register_user(&self, login: &str, password: &str) -> Result<()> {
        // bcrypt is CPU-bound; keep it off the async workers.
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| LedgerError::Credentials(e.to_string()))?
            .map_err(|e| LedgerError::Credentials(e.to_string()))?;
        match self.store.create_user(login, &password_hash).await {
            Ok(()) => {
                info!(login = %login, "User registered");
                Ok(())
            }
            Err(StorageError::LoginTaken(login)) => Err(LedgerError::LoginTaken(login)),
            Err(e) => Err(LedgerError::storage("register user")(e)),
        }
    }

    /// Returns `false` for an unknown login or a wrong password.
    pub async fn authenticate_user(&self, login: &str, password: &str) -> Result<bool> {
        let stored = self
            .store
            .password_hash(login)
            .await
            .map_err(LedgerError::storage("authenticate user"))?;
        let Some(hash) = stored else {
            return Ok(false);
        };
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| LedgerError::Credentials(e.to_string()))
    }

    pub async fn is_login_taken(&self, login: &str) -> Result<bool> {
        self.store
            .is_login_taken(login)
            .await
            .map_err(LedgerError::storage("check login"))
    }

    pub async fn check_order_owner(&self, number: &str, login: &str) -> Result<OrderOwnership> {
        self.store
            .check_order_owner(number, login)
            .await
            .map_err(LedgerError::storage("check order owner"))
    }

    /// Claim `number` for `login`.
    ///
    /// The store's uniqueness constraint arbitrates concurrent first uploads;
    /// a lost insert is re-read and reported as whoever now owns the number.
    pub async fn upload_order(&self, login: &str, number: &str) -> Result<UploadOutcome> {
        if !luhn::is_valid(number) {
            return Err(LedgerError::InvalidOrderNumber(number.to_string()));
        }

        match self.check_order_owner(number, login).await? {
            OrderOwnership::OwnedByRequester => return Ok(UploadOutcome::AlreadyAccepted),
            OrderOwnership::OwnedByOther => return Ok(UploadOutcome::Conflict),
            OrderOwnership::NotPresent => {}
        }

        let inserted = self
            .store
            .store_order(number, login)
            .await
            .map_err(LedgerError::storage("store order"))?;
        if inserted {
            info!(login = %login, order = %number, "Order accepted");
            return Ok(UploadOutcome::Accepted);
        }

        debug!(order = %number, "Lost upload race, re-reading owner");
        match self.check_order_owner(number, login).await? {
            OrderOwnership::OwnedByRequester => Ok(UploadOutcome::AlreadyAccepted),
            OrderOwnership::OwnedByOther => Ok(UploadOutcome::Conflict),
            OrderOwnership::NotPresent => Err(LedgerError::Storage {
                operation: "store order",
                source: StorageError::Corrupt(format!(
                    "order {number} rejected as duplicate but not found"
                )),
            }),
        }
    }

    pub async fn orders(&self, login: &str) -> Result<Vec<Order>> {
        self.store
            .orders(login)
            .await
            .map_err(LedgerError::storage("list orders"))
    }

    pub async fn unsettled_orders(&self) -> Result<Vec<Order>> {
        self.store
            .unsettled_orders()
            .await
            .map_err(LedgerError::storage("list unsettled orders"))
    }

    pub async fn apply_verdict(&self, verdict: &Verdict) -> Result<VerdictOutcome> {
        self.store
            .apply_verdict(verdict)
            .await
            .map_err(LedgerError::storage("apply verdict"))
    }

    pub async fn balance(&self, login: &str) -> Result<Balance> {
        self.store
            .balance(login)
            .await
            .map_err(LedgerError::storage("read balance"))
    }

    /// Spend `sum` points against the order reference `order`.
    ///
    /// The reference must pass Luhn but need not be an uploaded order.
    pub async fn withdraw(&self, login: &str, order: &str, sum: Amount) -> Result<()> {
        if !sum.is_positive() {
            return Err(LedgerError::InvalidAmount(sum));
        }
        if !luhn::is_valid(order) {
            return Err(LedgerError::InvalidOrderNumber(order.to_string()));
        }

        match self.store.withdraw(login, order, sum).await {
            Ok(()) => {
                info!(login = %login, order = %order, sum = %sum, "Withdrawal recorded");
                Ok(())
            }
            Err(StorageError::InsufficientFunds { balance, requested }) => {
                Err(LedgerError::InsufficientFunds { balance, requested })
            }
            Err(e) => Err(LedgerError::storage("withdraw")(e)),
        }
    }

    pub async fn withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>> {
        self.store
            .withdrawals(login)
            .await
            .map_err(LedgerError::storage("list withdrawals"))
    }
}
