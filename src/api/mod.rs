//! HTTP API.
//!
//! Routes under `/api/user`:
//! - `POST /register`, `POST /login`: issue a session token
//! - `POST /orders`, `GET /orders`: upload and list order numbers
//! - `GET /balance`, `POST /balance/withdraw`: read and spend points
//! - `GET /withdrawals`: list past withdrawals
//!
//! Everything except register and login requires a session token, sent as
//! the `auth_token` cookie or an `Authorization: Bearer` header.

mod error;
mod extract;
mod handlers;

use axum::extract::Request;
use axum::routing::{get, post};
use axum::{Router, ServiceExt};
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use extract::{AuthenticatedUser, AUTH_COOKIE};

use crate::auth::TokenSigner;
use crate::ledger::Ledger;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub tokens: TokenSigner,
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState) -> Router {
    let user = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/orders", post(handlers::upload_order).get(handlers::list_orders))
        .route("/balance", get(handlers::balance))
        .route("/balance/withdraw", post(handlers::withdraw))
        .route("/withdrawals", get(handlers::withdrawals));

    Router::new()
        .nest("/api/user", user)
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router wrapped so `/api/user/orders/` and `/api/user/orders` match alike.
pub fn app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!(address = ?listener.local_addr().ok(), "HTTP API listening");
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app(state)))
        .with_graceful_shutdown(shutdown)
        .await
}
