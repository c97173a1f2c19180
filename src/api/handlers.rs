//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use super::error::ApiError;
use super::extract::{AuthenticatedUser, AUTH_COOKIE};
use super::AppState;
use crate::ledger::{luhn, Amount, UploadOutcome};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    login: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    order: String,
    sum: Amount,
}

fn parse_credentials(body: Result<Json<Credentials>, JsonRejection>) -> Result<Credentials, ApiError> {
    let Json(credentials) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if credentials.login.trim().is_empty() || credentials.password.is_empty() {
        return Err(ApiError::BadRequest("login and password are required".to_string()));
    }
    Ok(credentials)
}

/// 200 with the session token as both a cookie and a bearer header.
fn session_response(state: &AppState, login: &str) -> Result<Response, ApiError> {
    let token = state
        .tokens
        .issue(login)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let cookie = format!("{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict");
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    Ok((StatusCode::OK, headers).into_response())
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let credentials = parse_credentials(body)?;
    state
        .ledger
        .register_user(&credentials.login, &credentials.password)
        .await?;
    session_response(&state, &credentials.login)
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let credentials = parse_credentials(body)?;
    let ok = state
        .ledger
        .authenticate_user(&credentials.login, &credentials.password)
        .await?;
    if !ok {
        info!(login = %credentials.login, "Login rejected");
        return Err(ApiError::Unauthorized);
    }
    session_response(&state, &credentials.login)
}

pub async fn upload_order(
    State(state): State<AppState>,
    AuthenticatedUser(login): AuthenticatedUser,
    body: String,
) -> Result<StatusCode, ApiError> {
    let number = body.trim();
    if number.is_empty() {
        return Err(ApiError::BadRequest("order number is required".to_string()));
    }
    if !luhn::is_digits(number) {
        return Err(ApiError::Unprocessable("order number must be digits".to_string()));
    }

    let status = match state.ledger.upload_order(&login, number).await? {
        UploadOutcome::Accepted => StatusCode::ACCEPTED,
        UploadOutcome::AlreadyAccepted => StatusCode::OK,
        UploadOutcome::Conflict => {
            return Err(ApiError::Conflict("order uploaded by another user".to_string()))
        }
    };
    Ok(status)
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(login): AuthenticatedUser,
) -> Result<Response, ApiError> {
    let orders = state.ledger.orders(&login).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(orders).into_response())
}

pub async fn balance(
    State(state): State<AppState>,
    AuthenticatedUser(login): AuthenticatedUser,
) -> Result<Response, ApiError> {
    let balance = state.ledger.balance(&login).await?;
    Ok(Json(balance).into_response())
}

pub async fn withdraw(
    State(state): State<AppState>,
    AuthenticatedUser(login): AuthenticatedUser,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state
        .ledger
        .withdraw(&login, request.order.trim(), request.sum)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn withdrawals(
    State(state): State<AppState>,
    AuthenticatedUser(login): AuthenticatedUser,
) -> Result<Response, ApiError> {
    let withdrawals = state.ledger.withdrawals(&login).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(withdrawals).into_response())
}
