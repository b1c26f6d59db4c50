//! Read-only status API.
//!
//! # Routes
//! - `GET /admin/status`: engine liveness and headline numbers
//! - `GET /admin/snapshot`: the full published snapshot
//! - `GET /admin/transactions/{code}`: records for one currency, newest first
//!
//! Every route sits behind a bearer API key.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::engine::WalletEngine;
use crate::lifecycle::Liveness;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<WalletEngine>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/snapshot", get(get_snapshot))
        .route("/admin/transactions/{code}", get(get_transactions))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router on `addr` until `liveness` is cleared.
pub async fn serve(router: Router, addr: SocketAddr, liveness: Liveness) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Admin API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { liveness.cleared().await })
        .await
}
