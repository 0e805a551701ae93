//! Application handlers and the work they schedule

use super::message::Message;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

/// Fire-and-forget work returned by a handler which is executed on the runtime
pub struct Action {
    name: String,
    future: BoxFuture<'static, EmptyResult>,
}

impl Action {
    /// Wraps a future into a named action
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = EmptyResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: future.boxed(),
        }
    }

    /// Name used when reporting the outcome of the action
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes the action in the background, logging failures
    pub fn spawn(self) -> JoinHandle<()> {
        let name = self.name;
        let span = tracing::info_span!("action", action = %name);

        tokio::spawn(
            async move {
                match self.future.await {
                    Ok(()) => debug!("Action completed"),
                    Err(error) => warn!(?error, "Action failed"),
                }
            }
            .instrument(span),
        )
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("name", &self.name).finish()
    }
}

/// Application code reacting to messages
#[async_trait]
pub trait Handler {
    /// Processes a message, optionally returning follow-up work
    async fn handle(&self, message: &Message) -> Result<Option<Action>, BoxedError>;
}

/// Dynamic dispatch version of [`Handler`]
pub type BoxedHandler = Arc<dyn Handler + Send + Sync>;

/// [`Handler`] implementation wrapping an async closure
pub struct FnHandler<F> {
    function: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Action>, BoxedError>> + Send,
{
    async fn handle(&self, message: &Message) -> Result<Option<Action>, BoxedError> {
        (self.function)(message.clone()).await
    }
}

/// Creates a [`BoxedHandler`] from an async closure receiving an owned copy of the message
pub fn handler_fn<F, Fut>(function: F) -> BoxedHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Action>, BoxedError>> + Send + 'static,
{
    Arc::new(FnHandler { function })
}
