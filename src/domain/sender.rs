//! Sending requests and replies through a relay

use super::address::{validate_name, Address, AddressError};
use super::message::{Status, NAMESPACE_SEPARATOR};
use crate::library::communication::relay::{BoxedRelay, RelayError, SEND_PATH};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

/// Document handed to the relay for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Slug of the sending application
    pub from: String,
    /// Recipients including broadcast and exclusion tokens
    pub to: Vec<String>,
    /// Identifier linking requests and their replies
    pub correlation_id: Option<String>,
    /// Arbitrary document sent along with the message
    pub payload: Map<String, Value>,
    /// Combination of name and status
    pub namespace: String,
}

/// Errors that occur while sending a message
#[derive(Debug, Error)]
pub enum SendError {
    /// Addressing is incomplete or invalid
    #[error("unable to address message")]
    Address(#[from] AddressError),
    /// Unknown statuses can not be sent
    #[error("refusing to send message with unknown status")]
    UnknownStatus,
    /// Payload is neither a map nor null
    #[error("payload must be a map")]
    PayloadNotAMap,
    /// Envelope could not be serialized
    #[error("unable to serialize envelope")]
    Serialization(#[from] serde_json::Error),
    /// The relay failed to deliver the envelope
    #[error("relay unavailable")]
    RelayUnavailable(#[from] RelayError),
}

/// Transmits messages on behalf of an application through a relay
pub struct Sender {
    relay: BoxedRelay,
    origin: String,
}

impl Sender {
    /// Creates a new sender identifying itself as `origin`
    pub fn new(relay: BoxedRelay, origin: impl Into<String>) -> Self {
        Self {
            relay,
            origin: origin.into(),
        }
    }

    /// Slug of the application this sender acts on behalf of
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Sends a request, assigning a correlation identifier if none has been set
    pub async fn request(&self, address: Address, payload: Value) -> Result<OutboundEnvelope, SendError> {
        self.send(address.correlate(), Status::Request, payload).await
    }

    /// Replies with a confirmation
    pub async fn confirm(&self, address: Address, payload: Value) -> Result<OutboundEnvelope, SendError> {
        self.send(address, Status::Confirmed, payload).await
    }

    /// Replies with a failure
    pub async fn fail(&self, address: Address, payload: Value) -> Result<OutboundEnvelope, SendError> {
        self.send(address, Status::Failed, payload).await
    }

    /// Replies that nobody handled a request
    pub async fn unreachable(&self, address: Address, payload: Value) -> Result<OutboundEnvelope, SendError> {
        self.send(address, Status::Unreachable, payload).await
    }

    /// Validates the address and transmits the message through the relay
    ///
    /// Nothing is transmitted when the address is invalid. The address is consumed
    /// regardless of the outcome.
    #[instrument(skip(self, address, payload), fields(name = ?address.name()))]
    pub async fn send(
        &self,
        address: Address,
        status: Status,
        payload: Value,
    ) -> Result<OutboundEnvelope, SendError> {
        if status == Status::Unknown {
            return Err(SendError::UnknownStatus);
        }

        let name = address.name().ok_or(AddressError::MissingName)?;
        validate_name(name)?;

        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(SendError::PayloadNotAMap),
        };

        let envelope = OutboundEnvelope {
            from: self.origin.clone(),
            to: address.resolve_targets()?,
            correlation_id: address.correlation_id().map(str::to_owned),
            payload,
            namespace: format!("{}{}{}", name, NAMESPACE_SEPARATOR, status),
        };

        let body = serde_json::to_value(&envelope)?;
        self.relay.post(SEND_PATH, &body).await?;

        debug!(namespace = %envelope.namespace, to = ?envelope.to, "Sent message");

        Ok(envelope)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::implementation::mock::MockRelay;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn sender() -> (Arc<MockRelay>, Sender) {
        let relay = Arc::new(MockRelay::new());
        let sender = Sender::new(relay.clone(), "user");
        (relay, sender)
    }

    #[tokio::test]
    async fn transmit_envelope() {
        let (relay, sender) = sender();

        let address = Address::new().to(["a", "b"]).except(["b"]).named("user.sync");
        sender
            .confirm(address.correlated("abc"), json!({ "ok": true }))
            .await
            .unwrap();

        assert_eq!(
            relay.posted(),
            vec![(
                SEND_PATH.to_owned(),
                json!({
                    "from": "user",
                    "to": ["a"],
                    "correlation_id": "abc",
                    "payload": { "ok": true },
                    "namespace": "user.sync:confirmed"
                })
            )]
        );
    }

    #[tokio::test]
    async fn broadcast_with_exclusions() {
        let (relay, sender) = sender();

        let address = Address::new().broadcast().except(["b"]).named("user.created");
        sender.request(address, Value::Null).await.unwrap();

        assert_eq!(relay.bodies()[0]["to"], json!(["*", "!b"]));
    }

    #[tokio::test]
    async fn correlate_requests() {
        let (_, sender) = sender();

        let envelope = sender
            .request(Address::new().to(["a"]).named("user.sync"), json!({}))
            .await
            .unwrap();

        assert!(envelope.correlation_id.is_some());
    }

    #[tokio::test]
    async fn validate_before_transmitting() {
        let (relay, sender) = sender();

        let invalid_name = sender
            .request(Address::new().to(["a"]).named("User.Sync"), json!({}))
            .await;
        let missing_name = sender.request(Address::new().to(["a"]), json!({})).await;
        let no_targets = sender
            .request(Address::new().named("user.sync"), json!({}))
            .await;
        let bad_payload = sender
            .request(Address::new().to(["a"]).named("user.sync"), json!([1]))
            .await;

        assert!(matches!(invalid_name, Err(SendError::Address(AddressError::InvalidName(_)))));
        assert!(matches!(missing_name, Err(SendError::Address(AddressError::MissingName))));
        assert!(matches!(no_targets, Err(SendError::Address(AddressError::NoTargetsSpecified))));
        assert!(matches!(bad_payload, Err(SendError::PayloadNotAMap)));
        assert!(relay.posted().is_empty());
    }

    #[tokio::test]
    async fn not_leak_addressing_between_sends() {
        let (relay, sender) = sender();

        let first = Address::new().to(["a"]).except(["c"]).named("user.sync").correlated("abc");
        sender.confirm(first, json!({})).await.unwrap();

        let second = Address::new().to(["c"]).named("user.sync");
        sender.confirm(second, json!({})).await.unwrap();

        let bodies = relay.bodies();
        assert_eq!(bodies[1]["to"], json!(["c"]));
        assert_eq!(bodies[1]["correlation_id"], Value::Null);
    }

    #[tokio::test]
    async fn surface_relay_failures() {
        let sender = Sender::new(Arc::new(MockRelay::failing()), "user");

        let result = sender
            .request(Address::new().to(["a"]).named("user.sync"), json!({}))
            .await;

        assert!(matches!(result, Err(SendError::RelayUnavailable(_))));
    }
}
