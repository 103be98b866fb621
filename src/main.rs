//! Binary entry point: wires logging, the Kubernetes client, the receiver
//! cache and the webhook server together.

use std::sync::Arc;

use anyhow::{Context, Result};
use kube::Client;
use tracing::info;

use webhook_receiver_controller::constants::{DEFAULT_LISTEN_ADDR, LISTEN_ADDR_ENV};
use webhook_receiver_controller::server::start_server;
use webhook_receiver_controller::store::KubeObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webhook_receiver_controller=info,tower_http=info".into()),
        )
        .init();

    info!("starting webhook receiver controller");

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let store = KubeObjectStore::new(client)
        .await
        .context("failed to start the receiver cache")?;

    let addr =
        std::env::var(LISTEN_ADDR_ENV).unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

    start_server(&addr, Arc::new(store)).await
}
