//! Request identity.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use super::error::ApiError;
use super::AppState;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// Login resolved from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == AUTH_COOKIE).then_some(value)
        })
}

/// Both carriers are tried, bearer first, so a stale header does not mask a
/// valid cookie.
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let candidates = [bearer_token(&parts.headers), cookie_token(&parts.headers)];
        for token in candidates.into_iter().flatten() {
            match state.tokens.verify(token) {
                Ok(login) => return Ok(AuthenticatedUser(login)),
                Err(e) => debug!(error = %e, "Rejected session token"),
            }
        }
        Err(ApiError::Unauthorized)
    }
}
