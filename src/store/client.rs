//! Kubernetes-backed [`ObjectStore`].
//!
//! Receiver lookups are served from a reflector cache fed by a cluster-wide
//! watch, so webhook routing never hits the API server. Secret reads and
//! dynamic resource operations go straight to the API server through typed
//! and dynamic clients.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use kube_runtime::reflector::{self, Store};
use kube_runtime::{watcher, WatchStreamExt};
use tracing::{debug, warn};

use super::{ObjectStore, StoreError};
use crate::crd::Receiver;

/// Field manager recorded on annotation patches.
const FIELD_MANAGER: &str = "webhook-receiver-controller";

/// [`ObjectStore`] backed by the Kubernetes API server.
pub struct KubeObjectStore {
    client: Client,
    receivers: Store<Receiver>,
}

impl KubeObjectStore {
    /// Start a cluster-wide watch on Receiver objects and return a store
    /// that answers webhook-path lookups from the resulting cache.
    ///
    /// Waits for the initial list to complete so the first webhook delivery
    /// after startup does not race an empty cache.
    pub async fn new(client: Client) -> anyhow::Result<Self> {
        let api = Api::<Receiver>::all(client.clone());
        let (reader, writer) = reflector::store::<Receiver>();

        let stream = reflector::reflector(
            writer,
            watcher(api, watcher::Config::default()).default_backoff(),
        );
        tokio::spawn(async move {
            stream
                .applied_objects()
                .for_each(|event| async {
                    match event {
                        Ok(receiver) => debug!(
                            name = receiver.metadata.name.as_deref().unwrap_or_default(),
                            namespace = receiver.metadata.namespace.as_deref().unwrap_or_default(),
                            "observed receiver"
                        ),
                        Err(err) => warn!(error = %err, "receiver watch error"),
                    }
                })
                .await;
        });
        reader.wait_until_ready().await?;

        Ok(Self {
            client,
            receivers: reader,
        })
    }

    fn dynamic_api(&self, gvk: &GroupVersionKind, namespace: &str) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(gvk);
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn receivers_by_webhook_path(&self, path: &str) -> Result<Vec<Receiver>, StoreError> {
        // Scan of the in-memory watch cache; receiver fleets are small and
        // the path-uniqueness invariant keeps results at one element.
        let matches = self
            .receivers
            .state()
            .iter()
            .filter(|receiver| receiver.webhook_path() == Some(path))
            .map(|receiver| (**receiver).clone())
            .collect();
        Ok(matches)
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, StoreError> {
        let api = Api::<Secret>::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_resource(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        Ok(self.dynamic_api(gvk, namespace).get_opt(name).await?)
    }

    async fn list_resources(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        match_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let selector = match_labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        let params = ListParams::default().labels(&selector);
        let list = self.dynamic_api(gvk, namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn annotate_resource(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let patch = serde_json::json!({
            "metadata": {
                "annotations": {
                    key: value,
                }
            }
        });
        self.dynamic_api(gvk, namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
