//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! loaded from YAML files, environment variables and command-line flags.

mod cli;
mod server;
mod storage;

pub use cli::Cli;
pub use server::{AccrualConfig, AuthConfig, ConfigError, ServerConfig};
pub use storage::{PostgresConfig, SqliteConfig, StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LOYALTY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LOYALTY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LOYALTY_LOG";

/// Legacy environment variable for the HTTP listen address.
pub const RUN_ADDRESS_ENV_VAR: &str = "RUN_ADDRESS";
/// Legacy environment variable for the database URI.
pub const DATABASE_URI_ENV_VAR: &str = "DATABASE_URI";
/// Legacy environment variable for the accrual service address.
pub const ACCRUAL_ADDRESS_ENV_VAR: &str = "ACCRUAL_SYSTEM_ADDRESS";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Accrual service configuration.
    pub accrual: AccrualConfig,
    /// Session token configuration.
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Resolve the full configuration for the binary: files and prefixed
    /// env, then legacy env variables, then flags, then validation.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Apply `RUN_ADDRESS`, `DATABASE_URI` and `ACCRUAL_SYSTEM_ADDRESS`.
    pub fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(address) = lookup(RUN_ADDRESS_ENV_VAR) {
            self.server.run_address = address;
        }
        if let Some(uri) = lookup(DATABASE_URI_ENV_VAR) {
            self.storage.set_database_uri(&uri);
        }
        if let Some(address) = lookup(ACCRUAL_ADDRESS_ENV_VAR) {
            self.accrual.address = address;
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(address) = &cli.run_address {
            self.server.run_address = address.clone();
        }
        if let Some(uri) = &cli.database_uri {
            self.storage.set_database_uri(uri);
        }
        if let Some(address) = &cli.accrual_address {
            self.accrual.address = address.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.run_address.trim().is_empty() {
            return Err(ConfigError::Missing("server.run_address"));
        }
        if self.accrual.address.trim().is_empty() {
            return Err(ConfigError::Missing("accrual.address"));
        }
        if self.accrual.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "accrual.poll_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "storage.max_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.accrual.address = "http://127.0.0.1:8081".to_string();
        config.auth.secret = "test-secret".to_string();
        config
    }
}
