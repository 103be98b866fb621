//! In-memory [`ObjectStore`].
//!
//! Holds receivers, secrets and dynamic resources in plain vectors behind
//! locks. Used as the fixture for the webhook handler tests and usable for
//! local development without a cluster. Objects without a namespace are
//! treated as living in `default`, mirroring how the API server defaults
//! namespaced objects.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::core::{DynamicObject, GroupVersionKind};

use super::{ObjectStore, StoreError};
use crate::crd::Receiver;

#[derive(Default)]
pub struct MemoryObjectStore {
    receivers: RwLock<Vec<Receiver>>,
    secrets: RwLock<Vec<Secret>>,
    resources: RwLock<Vec<DynamicObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_receiver(self, receiver: Receiver) -> Self {
        self.receivers.write().expect("lock poisoned").push(receiver);
        self
    }

    pub fn with_secret(self, secret: Secret) -> Self {
        self.secrets.write().expect("lock poisoned").push(secret);
        self
    }

    pub fn with_resource(self, resource: DynamicObject) -> Self {
        self.resources.write().expect("lock poisoned").push(resource);
        self
    }

    /// Snapshot of all stored dynamic resources.
    pub fn resources(&self) -> Vec<DynamicObject> {
        self.resources.read().expect("lock poisoned").clone()
    }
}

fn api_version_of(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

fn matches_gvk(resource: &DynamicObject, gvk: &GroupVersionKind) -> bool {
    resource
        .types
        .as_ref()
        .is_some_and(|types| types.kind == gvk.kind && types.api_version == api_version_of(gvk))
}

fn in_namespace(object_namespace: Option<&str>, namespace: &str) -> bool {
    object_namespace.unwrap_or("default") == namespace
}

fn labels_match(resource: &DynamicObject, match_labels: &BTreeMap<String, String>) -> bool {
    match_labels.iter().all(|(key, value)| {
        resource
            .metadata
            .labels
            .as_ref()
            .is_some_and(|labels| labels.get(key) == Some(value))
    })
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn receivers_by_webhook_path(&self, path: &str) -> Result<Vec<Receiver>, StoreError> {
        Ok(self
            .receivers
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|receiver| receiver.webhook_path() == Some(path))
            .cloned()
            .collect())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, StoreError> {
        Ok(self
            .secrets
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|secret| {
                secret.metadata.name.as_deref() == Some(name)
                    && in_namespace(secret.metadata.namespace.as_deref(), namespace)
            })
            .cloned())
    }

    async fn get_resource(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        Ok(self
            .resources
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|resource| {
                matches_gvk(resource, gvk)
                    && resource.metadata.name.as_deref() == Some(name)
                    && in_namespace(resource.metadata.namespace.as_deref(), namespace)
            })
            .cloned())
    }

    async fn list_resources(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        match_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        Ok(self
            .resources
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|resource| {
                matches_gvk(resource, gvk)
                    && in_namespace(resource.metadata.namespace.as_deref(), namespace)
                    && labels_match(resource, match_labels)
            })
            .cloned()
            .collect())
    }

    async fn annotate_resource(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut resources = self.resources.write().expect("lock poisoned");
        let resource = resources
            .iter_mut()
            .find(|resource| {
                matches_gvk(resource, gvk)
                    && resource.metadata.name.as_deref() == Some(name)
                    && in_namespace(resource.metadata.namespace.as_deref(), namespace)
            })
            .ok_or_else(|| StoreError::NotFound {
                kind: gvk.kind.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        resource
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
