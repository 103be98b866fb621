//! # Resource Notifier
//!
//! Resolves a receiver's declared resource references, applies the optional
//! resource filter, and writes a fresh reconcile-request annotation to every
//! surviving candidate.
//!
//! References are processed in declaration order and annotation writes are
//! best-effort sequential: a failing write aborts the request but earlier
//! annotations stand.

use chrono::{SecondsFormat, Utc};
use kube::core::GroupVersionKind;
use tracing::warn;
use uuid::Uuid;

use super::cel::ResourceFilter;
use super::error::Error;
use crate::constants::RECONCILE_REQUEST_ANNOTATION;
use crate::crd::{CrossNamespaceObjectReference, Receiver};
use crate::store::ObjectStore;

/// Annotate all resources referenced by `receiver` that survive `filter`.
///
/// Returns the number of annotated resources. A single token is generated
/// per invocation so every resource signalled by one delivery carries the
/// same reconcile-request value.
pub async fn notify_resources(
    store: &dyn ObjectStore,
    receiver: &Receiver,
    filter: Option<&ResourceFilter>,
) -> Result<usize, Error> {
    let receiver_namespace = receiver.metadata.namespace.as_deref().unwrap_or("default");
    let token = reconcile_request_token();
    let mut annotated = 0;

    for reference in &receiver.spec.resources {
        let gvk = reference_gvk(reference)?;
        let namespace = reference.namespace.as_deref().unwrap_or(receiver_namespace);

        let candidates = if reference.is_wildcard() {
            let Some(match_labels) = &reference.match_labels else {
                return Err(Error::Config(format!(
                    "matchLabels is required when {} name is '*'",
                    reference.kind
                )));
            };
            store.list_resources(&gvk, namespace, match_labels).await?
        } else {
            if reference.match_labels.is_some() {
                warn!(
                    kind = %reference.kind,
                    name = %reference.name,
                    "matchLabels ignored for resource referenced by name"
                );
            }
            let resource = store
                .get_resource(&gvk, namespace, &reference.name)
                .await?
                .ok_or_else(|| {
                    Error::Config(format!(
                        "unable to resolve {} '{}/{}'",
                        reference.kind, namespace, reference.name
                    ))
                })?;
            vec![resource]
        };

        for candidate in candidates {
            if let Some(filter) = filter {
                if !filter.matches(&candidate)? {
                    continue;
                }
            }
            let name = candidate.metadata.name.as_deref().unwrap_or_default();
            let candidate_namespace = candidate.metadata.namespace.as_deref().unwrap_or(namespace);
            store
                .annotate_resource(
                    &gvk,
                    candidate_namespace,
                    name,
                    RECONCILE_REQUEST_ANNOTATION,
                    &token,
                )
                .await?;
            annotated += 1;
        }
    }

    Ok(annotated)
}

fn reference_gvk(reference: &CrossNamespaceObjectReference) -> Result<GroupVersionKind, Error> {
    let api_version = reference.api_version.as_deref().unwrap_or_default();
    if api_version.is_empty() {
        return Err(Error::Config(format!(
            "apiVersion is required to annotate {} resources",
            reference.kind
        )));
    }
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    Ok(GroupVersionKind::gvk(group, version, &reference.kind))
}

/// A fresh, per-invocation unique annotation value: the current UTC time at
/// nanosecond precision plus a random suffix, so repeated deliveries always
/// register as a change on the annotated object.
fn reconcile_request_token() -> String {
    format!(
        "{}.{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        Uuid::new_v4().simple()
    )
}
