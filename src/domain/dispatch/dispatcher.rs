use super::{ListenerTable, Outcome, PromiseError, PromiseStore, Registry, RegistryDispatchFailed};
use crate::domain::address::Address;
use crate::domain::message::{Message, Status};
use crate::domain::sender::{SendError, Sender};
use crate::library::communication::BlackboxError;
use crate::library::BoxedError;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info_span, instrument, warn, Instrument};

/// Errors that occur while dispatching a single message
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Resolving a promise failed
    #[error("unable to resolve promise")]
    Promise(#[from] PromiseError),
    /// A registry binding failed
    #[error("registry dispatch failed")]
    Registry(#[from] RegistryDispatchFailed),
    /// The bound listener failed
    #[error("listener {key} failed")]
    Listener {
        /// Binding key of the listener
        key: String,
        /// Error returned by the listener
        #[source]
        source: BoxedError,
    },
    /// Replying to the sender failed
    #[error("unable to reply")]
    Reply(#[from] SendError),
    /// A handler panicked while processing the message
    #[error("handler panicked: {0}")]
    Panicked(String),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "unknown cause".to_owned(),
        },
    }
}

/// Stage which ended the processing of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Status is not understood, the message has been ignored
    Discarded,
    /// A promise continuation handled the message
    Promise,
    /// Registry bindings handled the message
    Registry,
    /// The bound listener handled the message
    Listener,
    /// Nobody handled the request and the sender has been told so
    Unreachable,
    /// Nobody handled the message and no reply was appropriate
    Dropped,
}

/// Pipeline routing messages through promises, registry, and listeners
pub struct Dispatcher {
    promises: PromiseStore,
    registry: Registry,
    listeners: ListenerTable,
    sender: Arc<Sender>,
}

impl Dispatcher {
    /// Assembles a new pipeline from its components
    pub fn new(
        promises: PromiseStore,
        registry: Registry,
        listeners: ListenerTable,
        sender: Arc<Sender>,
    ) -> Self {
        Self {
            promises,
            registry,
            listeners,
            sender,
        }
    }

    /// Sender used for replies
    pub fn sender(&self) -> &Arc<Sender> {
        &self.sender
    }

    /// Promise store consulted first
    pub fn promises(&self) -> &PromiseStore {
        &self.promises
    }

    /// Routes a message to the first stage handling it
    ///
    /// Failures are reported to the sender of a correlated request with a `failed` reply
    /// before being returned. Panicking handlers count as failures. Actions returned by
    /// handlers are spawned on the runtime.
    #[instrument(skip(self, message), fields(id = %message.id, namespace = %message.namespace))]
    pub async fn dispatch(&self, message: &Message) -> Result<Stage, DispatchError> {
        if message.status() == Status::Unknown {
            warn!("Discarding message with unknown status");
            return Ok(Stage::Discarded);
        }

        let routed = AssertUnwindSafe(self.route(message))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(DispatchError::Panicked(panic_message(payload))));

        match routed {
            Ok(stage) => {
                debug!(?stage, "Dispatched message");
                Ok(stage)
            }
            Err(error) => {
                warn!(?error, "Failed to dispatch message");
                self.report(message, &error).await;
                Err(error)
            }
        }
    }

    async fn route(&self, message: &Message) -> Result<Stage, DispatchError> {
        if let Some(outcome) = self
            .promises
            .try_resolve(message)
            .instrument(info_span!("promise"))
            .await?
        {
            outcome.spawn_actions();
            return Ok(Stage::Promise);
        }

        let outcome: Outcome = self
            .registry
            .run(message)
            .instrument(info_span!("registry"))
            .await?;

        if outcome.consumed {
            outcome.spawn_actions();
            return Ok(Stage::Registry);
        }

        // Silent bindings may still have scheduled work
        outcome.spawn_actions();

        if let Some(handler) = self.listeners.resolve(message) {
            let action = handler
                .handle(message)
                .instrument(info_span!("listener"))
                .await
                .map_err(|source| DispatchError::Listener {
                    key: message.listener_binding_key(self.listeners.root()),
                    source,
                })?;

            if let Some(action) = action {
                action.spawn();
            }

            return Ok(Stage::Listener);
        }

        self.reply_unreachable(message)
            .instrument(info_span!("unreachable"))
            .await
    }

    async fn reply_unreachable(&self, message: &Message) -> Result<Stage, DispatchError> {
        // Replies are never answered to prevent loops between applications
        if message.status() != Status::Request || message.from.is_none() {
            debug!("Dropping unhandled message");
            return Ok(Stage::Dropped);
        }

        self.sender
            .unreachable(Address::response_to(message), json!({}))
            .await?;

        Ok(Stage::Unreachable)
    }

    async fn report(&self, message: &Message, error: &DispatchError) {
        if matches!(error, DispatchError::Reply(_))
            || message.status() != Status::Request
            || message.correlation_id.is_none()
            || message.from.is_none()
        {
            return;
        }

        let cause = BlackboxError::from(error as &(dyn std::error::Error + 'static));
        let payload = json!({ "error": cause });

        if let Err(reply_error) = self
            .sender
            .fail(Address::response_to(message), payload)
            .await
        {
            warn!(error = ?reply_error, "Failed to report dispatch failure");
        }
    }
}
