//! # Receiver Custom Resource
//!
//! The `Receiver` CRD declares one incoming webhook endpoint. The reconciler
//! (a separate controller) assigns each receiver a unique webhook path under
//! `/hook/` and reports readiness through status conditions; the webhook
//! server in this crate only reads these objects.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: notification.toolkit.fluxcd.io/v1
//! kind: Receiver
//! metadata:
//!   name: registry-receiver
//!   namespace: apps
//! spec:
//!   type: github
//!   events: ["push"]
//!   secretRef:
//!     name: webhook-token
//!   resources:
//!     - apiVersion: image.toolkit.fluxcd.io/v1beta2
//!       kind: ImageRepository
//!       name: "*"
//!       matchLabels:
//!         team: payments
//! ```

use std::collections::BTreeMap;
use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{READY_CONDITION, WEBHOOK_PATH_PREFIX};

/// Name that selects every object of a referenced kind.
const WILDCARD_NAME: &str = "*";

/// Receiver describes one webhook endpoint and the resources it signals
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "notification.toolkit.fluxcd.io",
    version = "v1",
    kind = "Receiver",
    namespaced,
    status = "ReceiverStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Suspended", "type":"boolean", "jsonPath":".spec.suspend"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSpec {
    /// Webhook provider this receiver accepts deliveries from
    #[serde(rename = "type")]
    pub receiver_type: ReceiverType,
    /// Provider-specific event names the receiver accepts; empty means any
    #[serde(default)]
    pub events: Vec<String>,
    /// Secret in the receiver namespace holding the shared `token`
    pub secret_ref: LocalObjectReference,
    /// Resources to annotate when a delivery is accepted
    #[serde(default)]
    pub resources: Vec<CrossNamespaceObjectReference>,
    /// CEL expression narrowing which resolved resources are annotated.
    /// The expression sees `resource` (the candidate object) and
    /// `request.body` (the JSON-decoded delivery payload).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_filter: Option<String>,
    /// When true the receiver rejects all deliveries
    #[serde(default)]
    pub suspend: bool,
}

/// Supported webhook providers
///
/// Each variant selects the validator applied to incoming deliveries; the
/// registry-style providers (`dockerhub`, `quay`, `gcr`, `acr`, `nexus`)
/// carry no verifiable signature and rely on webhook path secrecy alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ReceiverType {
    #[serde(rename = "generic")]
    Generic,
    #[serde(rename = "generic-hmac")]
    GenericHmac,
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
    #[serde(rename = "bitbucket")]
    Bitbucket,
    #[serde(rename = "bitbucket-server")]
    BitbucketServer,
    #[serde(rename = "harbor")]
    Harbor,
    #[serde(rename = "dockerhub")]
    DockerHub,
    #[serde(rename = "quay")]
    Quay,
    #[serde(rename = "gcr")]
    Gcr,
    #[serde(rename = "acr")]
    Acr,
    #[serde(rename = "nexus")]
    Nexus,
    #[serde(rename = "cdevents")]
    CdEvents,
}

impl fmt::Display for ReceiverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReceiverType::Generic => "generic",
            ReceiverType::GenericHmac => "generic-hmac",
            ReceiverType::GitHub => "github",
            ReceiverType::GitLab => "gitlab",
            ReceiverType::Bitbucket => "bitbucket",
            ReceiverType::BitbucketServer => "bitbucket-server",
            ReceiverType::Harbor => "harbor",
            ReceiverType::DockerHub => "dockerhub",
            ReceiverType::Quay => "quay",
            ReceiverType::Gcr => "gcr",
            ReceiverType::Acr => "acr",
            ReceiverType::Nexus => "nexus",
            ReceiverType::CdEvents => "cdevents",
        })
    }
}

/// Reference to a Secret in the same namespace as the receiver
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    pub name: String,
}

/// Reference to a resource the receiver annotates on accepted deliveries
///
/// `name` may be a literal object name or `"*"` to select every object of
/// the kind, narrowed by `matchLabels`. The label selector applies only to
/// wildcard references.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossNamespaceObjectReference {
    /// API version of the referent, e.g. `image.toolkit.fluxcd.io/v1beta2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Kind of the referent
    pub kind: String,
    /// Name of the referent, or `"*"` for all objects of the kind
    #[serde(default)]
    pub name: String,
    /// Namespace of the referent; defaults to the receiver namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Label equality selector, applied only when `name` is `"*"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,
}

impl CrossNamespaceObjectReference {
    /// Whether this reference selects objects by label rather than by name.
    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD_NAME
    }
}

/// Status reported by the receiver reconciler
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Generated incoming webhook path, unique across all receivers.
    /// This is the sole routing key used by the webhook server.
    #[serde(default)]
    pub webhook_path: Option<String>,
}

/// Condition represents a status condition of the receiver
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Receiver {
    /// Whether the reconciler has marked this receiver `Ready=True`.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|status| {
                status
                    .conditions
                    .iter()
                    .any(|c| c.r#type == READY_CONDITION && c.status == "True")
            })
            .unwrap_or(false)
    }

    /// The webhook path assigned by the reconciler, if any.
    pub fn webhook_path(&self) -> Option<&str> {
        self.status.as_ref()?.webhook_path.as_deref()
    }

    /// Derive the webhook path for this receiver from a per-object token.
    ///
    /// The path is a hex-encoded SHA-256 of the token and the namespaced
    /// name, served under `/hook/`. The reconciler persists the result in
    /// `status.webhookPath`; the token must stay constant for the lifetime
    /// of the object so the path remains stable.
    pub fn generate_webhook_path(&self, token: &str) -> String {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        let namespace = self.metadata.namespace.as_deref().unwrap_or_default();
        let digest = Sha256::digest(format!("{token}{name}{namespace}").as_bytes());
        format!("{WEBHOOK_PATH_PREFIX}{}", hex::encode(digest))
    }
}
