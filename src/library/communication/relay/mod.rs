//! Transports which deliver outgoing envelopes into the streams of their targets
//!
//! A relay receives a JSON document and a path describing the operation. Outpost
//! only ever uses [`SEND_PATH`] with a body of the shape
//! `{from, to, correlation_id, payload, namespace}`.

mod http;

pub use self::http::{HttpRelay, ORIGIN_HEADER};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Path used for delivering envelopes
pub const SEND_PATH: &str = "/outpost/send";

/// Errors that occur while delivering a document through a relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay could not be reached at all
    #[error("unable to reach relay")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The relay did not answer in time
    #[error("relay did not respond within {0:?}")]
    Timeout(std::time::Duration),
    /// The relay answered with a non-success status
    #[error("relay rejected request with status {0}")]
    Rejected(u16),
    /// The relay does not know how to handle the given path
    #[error("relay does not support path {0}")]
    UnsupportedPath(String),
    /// The body could not be interpreted by the relay
    #[error("malformed relay body")]
    MalformedBody(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Transport for delivering JSON documents
#[async_trait]
pub trait Relay {
    /// Posts a document to the given path and returns the raw response body
    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, RelayError>;
}

/// Dynamic dispatch version of [`Relay`]
pub type BoxedRelay = Arc<dyn Relay + Send + Sync>;
