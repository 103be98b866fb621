//! # Error Taxonomy
//!
//! Typed failures raised while handling a webhook delivery. Every variant
//! maps onto exactly one HTTP status code; the textual detail is logged
//! server-side and never reflected to the caller, who is expected to retry
//! on 5xx.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, info};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    /// No receiver advertises the requested webhook path.
    #[error("no receiver registered for path '{0}'")]
    ReceiverNotFound(String),

    /// The receiver exists but is suspended or not marked Ready.
    #[error("receiver '{0}' is not ready to accept deliveries")]
    ReceiverNotReady(String),

    /// The delivery failed authentication, referenced a missing secret, or
    /// carried a disallowed event.
    #[error("{0}")]
    InvalidRequest(String),

    /// The receiver's declared configuration cannot be satisfied.
    #[error("{0}")]
    Config(String),

    /// The resource filter failed to compile or evaluate.
    #[error("resource filter: {0}")]
    Expression(String),

    /// The object store failed while reading or writing.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ReceiverNotFound(_) => StatusCode::NOT_FOUND,
            Error::ReceiverNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) | Error::Expression(_) | Error::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), reason = %self, "webhook delivery failed");
        } else {
            info!(status = status.as_u16(), reason = %self, "webhook delivery rejected");
        }
        status.into_response()
    }
}
