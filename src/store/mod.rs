//! # Object Store
//!
//! Read and write access to cluster state, abstracted behind [`ObjectStore`]
//! so the webhook server can run against the real API server in production
//! and an in-memory fixture in tests.
//!
//! The trait is the store contract the server relies on:
//! - a secondary index over receivers keyed by `status.webhookPath`
//! - typed Secret reads
//! - dynamic (any group-version-kind) get, list and annotation writes

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::core::{DynamicObject, GroupVersionKind};
use thiserror::Error;

use crate::crd::Receiver;

mod client;
mod memory;

pub use client::KubeObjectStore;
pub use memory::MemoryObjectStore;

/// Failures reading or writing the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object targeted by a write does not exist.
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The API server rejected or failed the request.
    #[error("api error: {0}")]
    Api(#[from] kube::Error),
}

/// Cluster state access used by the webhook server.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Receivers whose `status.webhookPath` equals `path`.
    ///
    /// This is the webhook-path index contract: implementations answer from
    /// a secondary index (or a cache scan for small fleets) and the result
    /// holds at most one element when the path-uniqueness invariant holds.
    async fn receivers_by_webhook_path(&self, path: &str) -> Result<Vec<Receiver>, StoreError>;

    /// Fetch a Secret by namespace and name; `None` when absent.
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Secret>, StoreError>;

    /// Fetch an arbitrary object by group-version-kind, namespace and name;
    /// `None` when absent.
    async fn get_resource(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError>;

    /// List objects of a kind in a namespace matching all given labels.
    async fn list_resources(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        match_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Set a single annotation on an object through a merge patch.
    async fn annotate_resource(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;
}
