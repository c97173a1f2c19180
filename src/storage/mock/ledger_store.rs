//! Mock LedgerStore implementation for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::ledger::{Amount, Balance, Order, OrderStatus, Verdict, Withdrawal, UNSETTLED};
use crate::storage::{LedgerStore, Result, StorageError, VerdictOutcome};

struct StoredUser {
    password_hash: String,
    balance: Balance,
}

struct StoredOrder {
    login: String,
    order: Order,
}

#[derive(Default)]
struct State {
    users: HashMap<String, StoredUser>,
    /// Insertion order doubles as the tie-breaking id.
    orders: Vec<StoredOrder>,
    withdrawals: Vec<(String, Withdrawal)>,
}

/// Mock ledger store that keeps everything in memory.
///
/// A single lock guards all tables so every operation is atomic, matching the
/// transactional guarantees of the SQL backends.
#[derive(Default)]
pub struct MockLedgerStore {
    state: RwLock<State>,
    fail_on_unsettled: RwLock<bool>,
    fail_on_apply: RwLock<HashSet<String>>,
    applied: RwLock<Vec<Verdict>>,
}

impl MockLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_unsettled(&self, fail: bool) {
        *self.fail_on_unsettled.write().await = fail;
    }

    /// Make `apply_verdict` fail for this order number.
    pub async fn fail_apply_for(&self, number: &str) {
        self.fail_on_apply.write().await.insert(number.to_string());
    }

    /// Every verdict passed to `apply_verdict`, in call order.
    pub async fn applied_verdicts(&self) -> Vec<Verdict> {
        self.applied.read().await.clone()
    }

    /// Current status of `number`, if stored.
    pub async fn status_of(&self, number: &str) -> Option<OrderStatus> {
        self.state
            .read()
            .await
            .orders
            .iter()
            .find(|stored| stored.order.number == number)
            .map(|stored| stored.order.status)
    }
}

#[async_trait]
impl LedgerStore for MockLedgerStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(login) {
            return Err(StorageError::LoginTaken(login.to_string()));
        }
        state.users.insert(
            login.to_string(),
            StoredUser {
                password_hash: password_hash.to_string(),
                balance: Balance {
                    current: Amount::ZERO,
                    withdrawn: Amount::ZERO,
                },
            },
        );
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state.users.get(login).map(|u| u.password_hash.clone()))
    }

    async fn is_login_taken(&self, login: &str) -> Result<bool> {
        Ok(self.state.read().await.users.contains_key(login))
    }

    async fn order_owner(&self, number: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|stored| stored.order.number == number)
            .map(|stored| stored.login.clone()))
    }

    async fn store_order(&self, number: &str, login: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.orders.iter().any(|stored| stored.order.number == number) {
            return Ok(false);
        }
        state.orders.push(StoredOrder {
            login: login.to_string(),
            order: Order {
                number: number.to_string(),
                status: OrderStatus::New,
                accrual: None,
                uploaded_at: Utc::now(),
            },
        });
        Ok(true)
    }

    async fn orders(&self, login: &str) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|stored| stored.login == login)
            .map(|stored| stored.order.clone())
            .collect())
    }

    async fn unsettled_orders(&self) -> Result<Vec<Order>> {
        if *self.fail_on_unsettled.read().await {
            return Err(StorageError::Unavailable("mock unsettled failure".to_string()));
        }
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|stored| UNSETTLED.contains(&stored.order.status))
            .map(|stored| stored.order.clone())
            .collect())
    }

    async fn apply_verdict(&self, verdict: &Verdict) -> Result<VerdictOutcome> {
        self.applied.write().await.push(verdict.clone());
        if self.fail_on_apply.read().await.contains(&verdict.number) {
            return Err(StorageError::Unavailable("mock apply failure".to_string()));
        }

        let mut state = self.state.write().await;
        let State { users, orders, .. } = &mut *state;

        let Some(stored) = orders
            .iter_mut()
            .find(|stored| stored.order.number == verdict.number)
        else {
            return Ok(VerdictOutcome::Skipped);
        };
        if !stored.order.status.can_transition_to(verdict.status) {
            return Ok(VerdictOutcome::Skipped);
        }

        let credited = verdict.credit();
        if let Some(amount) = credited {
            let user = users
                .get_mut(&stored.login)
                .ok_or_else(|| StorageError::UserNotFound(stored.login.clone()))?;
            user.balance.current = user.balance.current + amount;
        }
        stored.order.status = verdict.status;
        stored.order.accrual = verdict.accrual;

        Ok(VerdictOutcome::Applied { credited })
    }

    async fn balance(&self, login: &str) -> Result<Balance> {
        let state = self.state.read().await;
        state
            .users
            .get(login)
            .map(|u| u.balance)
            .ok_or_else(|| StorageError::UserNotFound(login.to_string()))
    }

    async fn withdraw(&self, login: &str, order: &str, sum: Amount) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(login)
            .ok_or_else(|| StorageError::UserNotFound(login.to_string()))?;

        if user.balance.current < sum {
            return Err(StorageError::InsufficientFunds {
                balance: user.balance.current,
                requested: sum,
            });
        }
        user.balance.current = user.balance.current - sum;
        user.balance.withdrawn = user.balance.withdrawn + sum;

        state.withdrawals.push((
            login.to_string(),
            Withdrawal {
                order: order.to_string(),
                sum,
                processed_at: Utc::now(),
            },
        ));
        Ok(())
    }

    async fn withdrawals(&self, login: &str) -> Result<Vec<Withdrawal>> {
        let state = self.state.read().await;
        Ok(state
            .withdrawals
            .iter()
            .rev()
            .filter(|(owner, _)| owner == login)
            .map(|(_, w)| w.clone())
            .collect())
    }
}
