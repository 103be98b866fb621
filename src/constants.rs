//! # Constants
//!
//! Shared constants used throughout the receiver controller.
//!
//! These values represent reasonable defaults and well-known Kubernetes
//! annotation keys; the listen address can be overridden via environment
//! variables.

/// Annotation written to referenced resources to request a reconciliation.
/// Downstream controllers watch this key and re-evaluate the object whenever
/// its value changes.
pub const RECONCILE_REQUEST_ANNOTATION: &str = "reconcile.fluxcd.io/requestedAt";

/// URL prefix under which every receiver's webhook path is served.
pub const WEBHOOK_PATH_PREFIX: &str = "/hook/";

/// Condition type a Receiver must report as `"True"` before the server
/// accepts deliveries for it.
pub const READY_CONDITION: &str = "Ready";

/// Default listen address for the webhook server
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9292";

/// Environment variable overriding the listen address
pub const LISTEN_ADDR_ENV: &str = "RECEIVER_ADDR";
