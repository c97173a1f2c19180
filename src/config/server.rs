//! Server, accrual, and auth configuration types.

use std::time::Duration;

use rand::RngCore;
use serde::Deserialize;
use tracing::warn;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API binds to, `host:port`.
    pub run_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_address: "localhost:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind. A bare `:port` binds all interfaces.
    pub fn bind_address(&self) -> String {
        if self.run_address.starts_with(':') {
            format!("0.0.0.0{}", self.run_address)
        } else {
            self.run_address.clone()
        }
    }
}

/// Accrual service connection and polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    /// Base address of the accrual service. Required.
    pub address: String,
    /// Seconds between reconciliation ticks.
    pub poll_interval_secs: u64,
    /// Per-request timeout for accrual queries.
    pub request_timeout_secs: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            poll_interval_secs: 3,
            request_timeout_secs: 5,
        }
    }
}

impl AccrualConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session token settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for session tokens. Empty means a random per-process key.
    pub secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_secs: 3600,
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Signing key bytes.
    ///
    /// Without a configured secret a random key is generated, so sessions do
    /// not survive a restart.
    pub fn signing_key(&self) -> Vec<u8> {
        if !self.secret.is_empty() {
            return self.secret.as_bytes().to_vec();
        }
        warn!("No auth secret configured, generating an ephemeral signing key");
        let mut key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut key);
        key
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
