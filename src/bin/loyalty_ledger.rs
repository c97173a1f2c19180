//! loyalty-ledger: loyalty points service
//!
//! Serves the user HTTP API and runs the accrual reconciliation worker
//! against one shared ledger store.
//!
//! ## Architecture
//! ```text
//! [HTTP clients] -> [api] -> [Ledger] -> [SQLite/Postgres]
//!                               ^
//! [accrual service] <- [ReconciliationWorker]
//! ```
//!
//! ## Configuration
//! - RUN_ADDRESS / -a: HTTP listen address
//! - DATABASE_URI / -d: postgres:// URI or SQLite path
//! - ACCRUAL_SYSTEM_ADDRESS / -r: accrual service base address
//! - LOYALTY__<SECTION>__<KEY>: any setting from config.yaml
//! - LOYALTY_LOG: tracing filter (default: info)

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use loyalty_ledger::accrual::{HttpAccrualClient, ReconciliationWorker, WorkerConfig};
use loyalty_ledger::api::{self, AppState};
use loyalty_ledger::auth::TokenSigner;
use loyalty_ledger::config::{Cli, Config};
use loyalty_ledger::ledger::Ledger;
use loyalty_ledger::storage::init_storage;
use loyalty_ledger::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::resolve(&cli).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        run_address = %config.server.run_address,
        accrual = %config.accrual.address,
        "Starting loyalty-ledger"
    );

    let store = init_storage(&config.storage).await.map_err(|e| {
        error!(error = %e, "Failed to initialize storage");
        e
    })?;
    let ledger = Ledger::new(store);

    let client = HttpAccrualClient::new(&config.accrual.address, config.accrual.request_timeout())?;
    let worker = ReconciliationWorker::new(
        ledger.clone(),
        Arc::new(client),
        WorkerConfig {
            poll_interval: config.accrual.poll_interval(),
        },
    )
    .spawn();

    let state = AppState {
        ledger,
        tokens: TokenSigner::new(config.auth.signing_key(), config.auth.token_ttl()),
    };
    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;

    let served = api::serve(listener, state, shutdown_signal()).await;

    info!("Stopping reconciliation worker");
    if let Err(e) = worker.shutdown().await {
        error!(error = %e, "Reconciliation worker panicked");
    }

    served?;
    info!("loyalty-ledger stopped");
    Ok(())
}
