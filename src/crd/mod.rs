//! # Custom Resource Definitions
//!
//! CRD types for the webhook receiver controller.
//!
//! The only resource owned by this controller is `Receiver`, which describes
//! one webhook endpoint: its provider type, its authentication secret, the
//! events it accepts, and the cluster resources it signals.

mod receiver;

pub use receiver::{
    Condition, CrossNamespaceObjectReference, LocalObjectReference, Receiver, ReceiverSpec,
    ReceiverStatus, ReceiverType,
};
