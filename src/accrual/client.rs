//! HTTP client for the accrual service.
//!
//! `GET <base>/api/orders/{number}`:
//! - `200` with `{order, status, accrual?}`: a verdict
//! - `204`: no verdict yet
//! - `429` with `Retry-After: <seconds>`: pause all polling
//! - anything else: per-order failure

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ledger::{AccrualStatus, Amount, Verdict};

/// Errors from a single accrual query. None of them are fatal to the worker.
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Interpreted oracle response.
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualReply {
    Verdict(Verdict),
    NotReady,
    RateLimited { retry_after: Duration },
}

/// Source of accrual verdicts.
#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn fetch(&self, number: &str) -> Result<AccrualReply, AccrualError>;
}

#[derive(Debug, Deserialize)]
struct AccrualResponse {
    order: String,
    status: AccrualStatus,
    #[serde(default)]
    accrual: Option<Amount>,
}

/// Seconds from a `Retry-After` header. Missing or unparsable means no wait.
pub fn parse_retry_after(value: Option<&HeaderValue>) -> Duration {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
}

/// reqwest-backed accrual client.
pub struct HttpAccrualClient {
    client: Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// `base_url` without a scheme is treated as `http://`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccrualError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = if base_url.contains("://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch(&self, number: &str) -> Result<AccrualReply, AccrualError> {
        let url = format!("{}/api/orders/{}", self.base_url, number);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let parsed: AccrualResponse = serde_json::from_slice(&body)
                    .map_err(|e| AccrualError::Decode(e.to_string()))?;
                debug!(order = %parsed.order, status = ?parsed.status, "Accrual verdict received");
                Ok(AccrualReply::Verdict(Verdict::from_accrual(
                    parsed.order,
                    parsed.status,
                    parsed.accrual,
                )))
            }
            StatusCode::NO_CONTENT => Ok(AccrualReply::NotReady),
            StatusCode::TOO_MANY_REQUESTS => {
                let header = response.headers().get(RETRY_AFTER);
                let retry_after = parse_retry_after(header);
                if header.is_some() && retry_after.is_zero() {
                    warn!(header = ?header, "Unparsable Retry-After, not waiting");
                }
                Ok(AccrualReply::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AccrualError::UnexpectedStatus {
                    status,
                    body: body.chars().take(200).collect(),
                })
            }
        }
    }
}
