//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::ledger::LedgerError;
use crate::storage::StorageError;

/// Caller-visible failure. Internal detail is logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidOrderNumber(number) => {
                ApiError::Unprocessable(format!("invalid order number {number:?}"))
            }
            LedgerError::InvalidAmount(sum) => ApiError::BadRequest(format!("invalid sum {sum}")),
            LedgerError::InsufficientFunds { .. } => ApiError::InsufficientFunds,
            LedgerError::LoginTaken(login) => ApiError::Conflict(format!("login {login} taken")),
            LedgerError::Storage {
                source: StorageError::UserNotFound(_),
                ..
            } => ApiError::Unauthorized,
            other @ (LedgerError::Storage { .. } | LedgerError::Credentials(_)) => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}
