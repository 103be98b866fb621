//! # Webhook Receiver Controller
//!
//! The webhook receiver core of a cluster-native notification controller.
//!
//! The server exposes `POST /hook/{path}` and, for each delivery:
//!
//! 1. **Routes** the request path to exactly one [`crd::Receiver`] through
//!    the object store's webhook-path index.
//! 2. **Authenticates** the delivery with the validator for the receiver's
//!    provider type (HMAC signatures, verbatim tokens, event allow-lists).
//! 3. **Notifies** the receiver's declared resources: resolves each
//!    reference by name or label selector, optionally narrows the set with
//!    a CEL `resourceFilter`, and writes a fresh reconcile-request
//!    annotation to every match.
//!
//! Downstream reconciliation of the annotated resources is performed by
//! other controllers; this crate only reads Receivers and Secrets and
//! writes a single annotation on referenced objects.

pub mod constants;
pub mod crd;
pub mod server;
pub mod store;
