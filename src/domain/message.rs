//! Envelopes read from an inbox stream

use crate::library::helpers::{capitalize, split_into_two};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Root under which listener binding keys are located unless configured otherwise
pub const DEFAULT_LISTENER_ROOT: &str = "App\\Outpost\\";

/// Separator between the name and status within a namespace
pub const NAMESPACE_SEPARATOR: &str = ":";

/// Name returned when a namespace does not carry a separator
pub const UNKNOWN_NAME: &str = "unknown";

const FIELD_NAMESPACE: &str = "namespace";
const FIELD_PAYLOAD: &str = "payload";
const FIELD_FROM: &str = "from";
const FIELD_CORRELATION_ID: &str = "correlation_id";
const FIELD_TIMESTAMP: &str = "timestamp";

/// Entry which can not be interpreted as a message and will never become one
#[derive(Debug, Error)]
pub enum MalformedEnvelope {
    /// Entry lacks the `namespace` field
    #[error("entry {0} has no namespace")]
    MissingNamespace(String),
    /// The `payload` field is not valid JSON
    #[error("entry {id} carries an undecodable payload")]
    UndecodablePayload {
        /// Stream identifier of the entry
        id: String,
        /// Underlying decoding error
        source: serde_json::Error,
    },
    /// The `payload` field decoded into something other than a map
    #[error("entry {0} carries a payload that is not a map")]
    PayloadNotAMap(String),
}

/// Stage of a conversation a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Initial message asking the recipient to do something
    Request,
    /// Reply indicating success
    Confirmed,
    /// Reply indicating failure
    Failed,
    /// Reply indicating that nobody handled the request
    Unreachable,
    /// Anything that is not understood, never dispatched
    Unknown,
}

impl Status {
    /// Statuses which may be sent
    pub const KNOWN: [Status; 4] = [
        Status::Request,
        Status::Confirmed,
        Status::Failed,
        Status::Unreachable,
    ];

    /// Parses the textual representation, yielding [`Status::Unknown`] for anything unrecognized
    pub fn parse(input: &str) -> Self {
        match input {
            "request" => Self::Request,
            "confirmed" => Self::Confirmed,
            "failed" => Self::Failed,
            "unreachable" => Self::Unreachable,
            _ => Self::Unknown,
        }
    }

    /// Textual representation as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Unreachable => "unreachable",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the status marks a reply to an earlier request
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Unreachable)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable envelope received from the inbox stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Identifier assigned by the stream
    pub id: String,
    /// Combination of name and status, e.g. `user.sync:request`
    pub namespace: String,
    /// Arbitrary document sent along with the message
    pub payload: Map<String, Value>,
    /// Slug of the sending application
    pub from: Option<String>,
    /// Identifier linking requests and their replies
    pub correlation_id: Option<String>,
    /// Time the message was sent in milliseconds since the epoch
    pub timestamp: Option<i64>,
}

impl Message {
    /// Builds a message from the raw fields of a stream entry
    pub fn make(id: impl Into<String>, fields: &HashMap<String, String>) -> Result<Self, MalformedEnvelope> {
        let id = id.into();

        let namespace = match fields.get(FIELD_NAMESPACE) {
            Some(namespace) => namespace.to_owned(),
            None => return Err(MalformedEnvelope::MissingNamespace(id)),
        };

        let payload = match fields.get(FIELD_PAYLOAD) {
            None => Map::new(),
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Null) => Map::new(),
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err(MalformedEnvelope::PayloadNotAMap(id)),
                Err(source) => return Err(MalformedEnvelope::UndecodablePayload { id, source }),
            },
        };

        let timestamp = fields
            .get(FIELD_TIMESTAMP)
            .and_then(|raw| raw.parse::<i64>().ok());

        Ok(Self {
            id,
            namespace,
            payload,
            from: non_empty(fields.get(FIELD_FROM)),
            correlation_id: non_empty(fields.get(FIELD_CORRELATION_ID)),
            timestamp,
        })
    }

    /// Name portion of the namespace, e.g. `user.sync`
    pub fn name(&self) -> &str {
        match split_into_two(&self.namespace, NAMESPACE_SEPARATOR) {
            Some((name, _)) => name,
            None => UNKNOWN_NAME,
        }
    }

    /// Status portion of the namespace
    pub fn status(&self) -> Status {
        match split_into_two(&self.namespace, NAMESPACE_SEPARATOR) {
            Some((_, status)) => Status::parse(status),
            None => Status::Unknown,
        }
    }

    /// Key under which a listener for this message would be bound
    pub fn listener_binding_key(&self, root: &str) -> String {
        listener_binding_key(root, self.name())
    }
}

/// Derives the listener binding key of a name, e.g. `user.sync` becomes `App\Outpost\User\Sync`
pub fn listener_binding_key(root: &str, name: &str) -> String {
    let segments: Vec<String> = name.split('.').map(capitalize).collect();
    format!("{}{}", root, segments.join("\\"))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|value| !value.is_empty()).cloned()
}
