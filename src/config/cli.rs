//! Command-line flags.

use clap::Parser;

/// Loyalty points ledger service.
#[derive(Parser, Debug, Default)]
#[command(name = "loyalty-ledger")]
#[command(about = "Loyalty points ledger with accrual reconciliation")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// HTTP listen address (host:port)
    #[arg(short = 'a', long)]
    pub run_address: Option<String>,

    /// Database URI: a postgres:// URI or a SQLite path
    #[arg(short = 'd', long)]
    pub database_uri: Option<String>,

    /// Accrual service base address
    #[arg(short = 'r', long)]
    pub accrual_address: Option<String>,
}
