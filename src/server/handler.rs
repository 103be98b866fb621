//! # Webhook Handler
//!
//! Runs a `POST /hook/{path}` delivery through the full pipeline: receiver
//! lookup, readiness gate, provider authentication, filter compilation and
//! resource notification.
//!
//! The body is buffered once up front; signature verification and filter
//! evaluation both read the same bytes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use tracing::{info, warn};

use super::cel::ResourceFilter;
use super::error::Error;
use super::{auth, notify, AppState};
use crate::constants::WEBHOOK_PATH_PREFIX;
use crate::crd::Receiver;
use crate::store::ObjectStore;

pub(super) async fn handle_payload(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, Error> {
    let webhook_path = format!("{WEBHOOK_PATH_PREFIX}{path}");

    let receivers = state.store.receivers_by_webhook_path(&webhook_path).await?;
    let Some(receiver) = receivers.first() else {
        return Err(Error::ReceiverNotFound(webhook_path));
    };
    if receivers.len() > 1 {
        warn!(
            path = %webhook_path,
            matches = receivers.len(),
            "webhook path matches multiple receivers, using the first"
        );
    }

    let name = receiver.metadata.name.as_deref().unwrap_or_default();
    if receiver.spec.suspend || !receiver.is_ready() {
        return Err(Error::ReceiverNotReady(name.to_string()));
    }

    let token = receiver_token(state.store.as_ref(), receiver).await?;
    auth::validate(
        receiver.spec.receiver_type,
        &headers,
        &body,
        &token,
        &receiver.spec.events,
    )?;

    // Compiled once here, evaluated for every candidate resource.
    let filter = receiver
        .spec
        .resource_filter
        .as_deref()
        .map(|expr| ResourceFilter::new(expr, &headers, &body))
        .transpose()?;

    let annotated = notify::notify_resources(state.store.as_ref(), receiver, filter.as_ref()).await?;

    info!(
        receiver = %name,
        provider = %receiver.spec.receiver_type,
        annotated,
        "handled webhook delivery"
    );
    Ok(StatusCode::OK)
}

/// Fetch the shared token from the receiver's referenced secret.
///
/// Every provider type requires the secret to exist and carry a `token`
/// key, even those that never compare it; a missing secret is a client
/// configuration problem, not a server fault.
async fn receiver_token(store: &dyn ObjectStore, receiver: &Receiver) -> Result<Vec<u8>, Error> {
    let namespace = receiver.metadata.namespace.as_deref().unwrap_or("default");
    let secret_name = &receiver.spec.secret_ref.name;
    let secret = store
        .get_secret(namespace, secret_name)
        .await?
        .ok_or_else(|| {
            Error::InvalidRequest(format!("unable to read secret '{namespace}/{secret_name}'"))
        })?;
    secret
        .data
        .as_ref()
        .and_then(|data| data.get("token"))
        .map(|token| token.0.clone())
        .ok_or_else(|| {
            Error::InvalidRequest(format!(
                "secret '{namespace}/{secret_name}' has no 'token' key"
            ))
        })
}

pub(super) async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub(super) async fn readyz() -> StatusCode {
    StatusCode::OK
}
