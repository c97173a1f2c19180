//! Reconciliation worker.
//!
//! Polls unsettled orders on a fixed interval, asks the accrual service for a
//! verdict on each, and applies verdicts through the ledger. A `429` aborts
//! the rest of the tick and pauses polling for the advertised duration.
//!
//! Cancellation is observed between ticks, between orders, while an oracle
//! request is in flight and during a rate-limit pause. A verdict that has
//! started applying is never interrupted; the store transaction either
//! commits or rolls back on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::client::{AccrualClient, AccrualReply};
use crate::ledger::Ledger;
use crate::storage::VerdictOutcome;

/// Worker timing.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Delay between the end of one tick and the start of the next.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Where the worker is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Polling,
    /// Rate limited; no oracle calls before the deadline.
    PausedUntil(Instant),
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every unsettled order was visited.
    Completed { applied: usize },
    /// The oracle asked us to back off; remaining orders were not queried.
    RateLimited { retry_after: Duration },
    /// The unsettled set could not be read.
    Failed,
    Cancelled,
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = cancel.wait_for(|stop| *stop).await;
}

/// Sleep until `deadline`. Returns `true` if cancelled first.
async fn sleep_or_cancel(cancel: &mut watch::Receiver<bool>, deadline: Instant) -> bool {
    if *cancel.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => false,
        _ = cancelled(cancel) => true,
    }
}

pub struct ReconciliationWorker {
    ledger: Ledger,
    client: Arc<dyn AccrualClient>,
    config: WorkerConfig,
    state: WorkerState,
}

impl ReconciliationWorker {
    pub fn new(ledger: Ledger, client: Arc<dyn AccrualClient>, config: WorkerConfig) -> Self {
        Self {
            ledger,
            client,
            config,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run one reconciliation pass over the unsettled set.
    pub async fn tick(&mut self, cancel: &mut watch::Receiver<bool>) -> TickOutcome {
        if *cancel.borrow() {
            return TickOutcome::Cancelled;
        }
        self.state = WorkerState::Polling;
        let outcome = self.poll(cancel).await;
        if !matches!(self.state, WorkerState::PausedUntil(_)) {
            self.state = WorkerState::Idle;
        }
        outcome
    }

    async fn poll(&mut self, cancel: &mut watch::Receiver<bool>) -> TickOutcome {
        let orders = match self.ledger.unsettled_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "Failed to load unsettled orders");
                return TickOutcome::Failed;
            }
        };
        if orders.is_empty() {
            debug!("No unsettled orders");
            return TickOutcome::Completed { applied: 0 };
        }
        debug!(count = orders.len(), "Reconciling unsettled orders");

        let mut applied = 0;
        for order in orders {
            if *cancel.borrow() {
                return TickOutcome::Cancelled;
            }

            let reply = tokio::select! {
                reply = self.client.fetch(&order.number) => reply,
                _ = cancelled(cancel) => return TickOutcome::Cancelled,
            };

            let verdict = match reply {
                Ok(AccrualReply::Verdict(verdict)) => verdict,
                Ok(AccrualReply::NotReady) => {
                    debug!(order = %order.number, "No verdict yet");
                    continue;
                }
                Ok(AccrualReply::RateLimited { retry_after }) => {
                    warn!(order = %order.number, retry_after = ?retry_after, "Accrual service rate limited, pausing");
                    self.state = WorkerState::PausedUntil(Instant::now() + retry_after);
                    return TickOutcome::RateLimited { retry_after };
                }
                Err(e) => {
                    warn!(order = %order.number, error = %e, "Accrual query failed");
                    continue;
                }
            };

            if verdict.number != order.number {
                warn!(order = %order.number, reply = %verdict.number, "Verdict for a different order, ignoring");
                continue;
            }

            match self.ledger.apply_verdict(&verdict).await {
                Ok(VerdictOutcome::Applied { credited }) => {
                    applied += 1;
                    info!(
                        order = %order.number,
                        status = %verdict.status,
                        credited = ?credited,
                        "Verdict applied"
                    );
                }
                Ok(VerdictOutcome::Skipped) => {
                    debug!(order = %order.number, "Order already settled");
                }
                Err(e) => {
                    error!(order = %order.number, error = %e, "Failed to apply verdict");
                }
            }
        }

        TickOutcome::Completed { applied }
    }

    /// Tick every `poll_interval` until cancelled.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        info!(interval = ?self.config.poll_interval, "Reconciliation worker started");

        loop {
            if let WorkerState::PausedUntil(deadline) = self.state {
                if sleep_or_cancel(&mut cancel, deadline).await {
                    break;
                }
                self.state = WorkerState::Idle;
            }

            let next = Instant::now() + self.config.poll_interval;
            if sleep_or_cancel(&mut cancel, next).await {
                break;
            }

            if self.tick(&mut cancel).await == TickOutcome::Cancelled {
                break;
            }
        }

        self.state = WorkerState::Idle;
        info!("Reconciliation worker stopped");
    }

    /// Run on a background task.
    pub fn spawn(self) -> WorkerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(cancel_rx));
        WorkerHandle {
            cancel: cancel_tx,
            task,
        }
    }
}

/// Handle to a running worker. Dropping it also stops the worker.
pub struct WorkerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        self.stop();
        self.task.await
    }
}
