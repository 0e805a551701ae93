use crate::domain::{Action, Address, Handler, Message, Sender, Status};
use crate::library::BoxedError;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Name of the built-in health check message
pub const PING: &str = "outpost.ping";

/// Listener confirming `outpost.ping` requests so the round trip can be health-checked
pub struct PingListener {
    sender: Arc<Sender>,
}

impl PingListener {
    /// Creates a new listener replying through the given sender
    pub fn new(sender: Arc<Sender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Handler for PingListener {
    async fn handle(&self, message: &Message) -> Result<Option<Action>, BoxedError> {
        if message.status() == Status::Request {
            let payload = json!({
                "pong": chrono::Utc::now().timestamp_millis(),
                "app": self.sender.origin(),
            });

            self.sender
                .confirm(Address::response_to(message), payload)
                .await?;
        }

        Ok(None)
    }
}
