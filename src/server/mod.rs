//! # HTTP Server
//!
//! The webhook receiver server. Exposes the single functional endpoint
//! `POST /hook/{path}` plus `/healthz` and `/readyz` probes, and serves
//! until the process receives a termination signal.
//!
//! Requests are handled independently; the shared [`ObjectStore`] is the
//! only state that crosses request boundaries.

mod auth;
mod cel;
mod error;
mod handler;
mod notify;

pub use cel::{validate_expression, ResourceFilter};
pub use error::Error;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::store::ObjectStore;

/// Shared state injected into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
}

/// Build the receiver router on top of `store`.
pub fn build_router(store: Arc<dyn ObjectStore>) -> Router {
    Router::new()
        .route("/hook/{path}", post(handler::handle_payload))
        .route("/healthz", get(handler::healthz))
        .route("/readyz", get(handler::readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

/// Serve the router on `addr` until SIGTERM or ctrl-c.
pub async fn start_server(addr: &str, store: Arc<dyn ObjectStore>) -> Result<(), anyhow::Error> {
    let app = build_router(store);
    let listener = TcpListener::bind(addr).await?;

    info!("webhook server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
