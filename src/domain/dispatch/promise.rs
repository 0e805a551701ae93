use super::Outcome;
use crate::domain::handler::BoxedHandler;
use crate::domain::message::{Message, Status};
use crate::library::communication::context::BoxedContextStore;
use crate::library::BoxedError;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const PROMISE_PREFIX: &str = "promise.";

/// Errors raised while registering or resolving promises
#[derive(Debug, Error)]
pub enum PromiseError {
    /// No continuation has been registered under the name
    #[error("unknown continuation {0}")]
    UnknownContinuation(String),
    /// Promises can only await replies
    #[error("promises can not await {0} messages")]
    NotAReply(Status),
    /// The context store is not available
    #[error("unable to access context store")]
    Store(#[source] BoxedError),
    /// The continuation itself failed
    #[error("continuation {name} failed")]
    ContinuationFailed {
        /// Name of the continuation
        name: String,
        /// Error returned by the continuation
        #[source]
        source: BoxedError,
    },
}

/// Continuations awaiting replies to earlier requests
///
/// Continuations are registered by name at startup. Awaiting a reply stores only the
/// name in the shared context store, so any process of the application may resolve it.
/// Resolving a correlation id atomically clears every status awaited for it, so a
/// continuation runs at most once even when replies are delivered repeatedly.
pub struct PromiseStore {
    store: BoxedContextStore,
    continuations: HashMap<String, BoxedHandler>,
    ttl: Option<Duration>,
}

impl PromiseStore {
    /// Creates a store persisting promises in the given context store
    pub fn new(store: BoxedContextStore) -> Self {
        Self {
            store,
            continuations: HashMap::new(),
            ttl: None,
        }
    }

    /// Lets unresolved promises expire after the given duration
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Makes a continuation available under a name
    pub fn continuation(&mut self, name: impl Into<String>, handler: BoxedHandler) -> &mut Self {
        self.continuations.insert(name.into(), handler);
        self
    }

    /// Runs the named continuation once a `confirmed` reply arrives
    pub async fn on_confirm(&self, correlation_id: &str, continuation: &str) -> Result<(), PromiseError> {
        self.await_reply(correlation_id, Status::Confirmed, continuation).await
    }

    /// Runs the named continuation once a `failed` reply arrives
    pub async fn on_fail(&self, correlation_id: &str, continuation: &str) -> Result<(), PromiseError> {
        self.await_reply(correlation_id, Status::Failed, continuation).await
    }

    /// Runs the named continuation once an `unreachable` reply arrives
    pub async fn on_unreachable(&self, correlation_id: &str, continuation: &str) -> Result<(), PromiseError> {
        self.await_reply(correlation_id, Status::Unreachable, continuation).await
    }

    /// Stores a continuation for the combination of correlation id and status
    pub async fn await_reply(
        &self,
        correlation_id: &str,
        status: Status,
        continuation: &str,
    ) -> Result<(), PromiseError> {
        if !status.is_reply() {
            return Err(PromiseError::NotAReply(status));
        }

        if !self.continuations.contains_key(continuation) {
            return Err(PromiseError::UnknownContinuation(continuation.to_owned()));
        }

        self.store
            .put(&status_key(correlation_id, status), continuation, self.ttl)
            .await
            .map_err(PromiseError::Store)?;

        self.store
            .put(&marker_key(correlation_id), "", self.ttl)
            .await
            .map_err(PromiseError::Store)
    }

    /// Whether anything is still awaited for the correlation id
    pub async fn is_pending(&self, correlation_id: &str) -> Result<bool, PromiseError> {
        self.store
            .has(&marker_key(correlation_id))
            .await
            .map_err(PromiseError::Store)
    }

    /// Runs the continuation awaiting the message, if any, and clears all others of its correlation id
    pub async fn try_resolve(&self, message: &Message) -> Result<Option<Outcome>, PromiseError> {
        let status = message.status();

        let correlation_id = match &message.correlation_id {
            Some(correlation_id) if status.is_reply() => correlation_id,
            _ => return Ok(None),
        };

        let mut related: Vec<String> = Status::KNOWN
            .iter()
            .filter(|other| other.is_reply() && **other != status)
            .map(|other| status_key(correlation_id, *other))
            .collect();
        related.push(marker_key(correlation_id));

        let name = match self
            .store
            .pull(&status_key(correlation_id, status), &related)
            .await
            .map_err(PromiseError::Store)?
        {
            Some(name) => name,
            None => return Ok(None),
        };

        debug!(continuation = %name, %correlation_id, "Resolving promise");

        let handler = self
            .continuations
            .get(&name)
            .ok_or_else(|| PromiseError::UnknownContinuation(name.clone()))?;

        let action = handler
            .handle(message)
            .await
            .map_err(|source| PromiseError::ContinuationFailed { name, source })?;

        Ok(Some(Outcome {
            consumed: true,
            actions: action.into_iter().collect(),
        }))
    }
}

fn marker_key(correlation_id: &str) -> String {
    format!("{}{}", PROMISE_PREFIX, correlation_id)
}

fn status_key(correlation_id: &str, status: Status) -> String {
    format!("{}{}.{}", PROMISE_PREFIX, correlation_id, status)
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::handler::handler_fn;
    use crate::library::communication::context::{ContextStore, MemoryContextStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn message(namespace: &str, correlation_id: &str) -> Message {
        let mut fields = std::collections::HashMap::new();
        fields.insert("namespace".to_owned(), namespace.to_owned());
        fields.insert("correlation_id".to_owned(), correlation_id.to_owned());
        Message::make("1-0", &fields).unwrap()
    }

    fn counting_store() -> (Arc<MemoryContextStore>, Arc<AtomicUsize>, PromiseStore) {
        let context = Arc::new(MemoryContextStore::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let handler_counter = counter.clone();

        let mut store = PromiseStore::new(context.clone());
        store.continuation(
            "count",
            handler_fn(move |_| {
                let counter = handler_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            }),
        );

        (context, counter, store)
    }

    #[tokio::test]
    async fn resolve_exactly_once() {
        let (_, counter, store) = counting_store();
        store.on_confirm("abc", "count").await.unwrap();
        store.on_fail("abc", "count").await.unwrap();
        assert!(store.is_pending("abc").await.unwrap());

        let confirmed = message("user.sync:confirmed", "abc");
        let outcome = store.try_resolve(&confirmed).await.unwrap();
        assert!(outcome.map(|o| o.consumed).unwrap_or(false));

        assert!(store.try_resolve(&confirmed).await.unwrap().is_none());
        assert!(store
            .try_resolve(&message("user.sync:failed", "abc"))
            .await
            .unwrap()
            .is_none());

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!store.is_pending("abc").await.unwrap());
    }

    #[tokio::test]
    async fn clear_all_statuses_on_resolution() {
        let (context, _, store) = counting_store();
        store.on_confirm("abc", "count").await.unwrap();
        store.on_unreachable("abc", "count").await.unwrap();

        store
            .try_resolve(&message("user.sync:unreachable", "abc"))
            .await
            .unwrap();

        assert!(!context.has("promise.abc.confirmed").await.unwrap());
        assert!(!context.has("promise.abc.unreachable").await.unwrap());
        assert!(!context.has("promise.abc").await.unwrap());
    }

    #[tokio::test]
    async fn ignore_unrelated_messages() {
        let (_, counter, store) = counting_store();
        store.on_confirm("abc", "count").await.unwrap();

        let other_status = message("user.sync:failed", "abc");
        let other_id = message("user.sync:confirmed", "xyz");
        let request = message("user.sync:request", "abc");

        assert!(store.try_resolve(&other_status).await.unwrap().is_none());
        assert!(store.try_resolve(&other_id).await.unwrap().is_none());
        assert!(store.try_resolve(&request).await.unwrap().is_none());

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(store.is_pending("abc").await.unwrap());
    }

    #[tokio::test]
    async fn refuse_unknown_continuations() {
        let (_, _, store) = counting_store();

        assert!(matches!(
            store.on_confirm("abc", "missing").await,
            Err(PromiseError::UnknownContinuation(_))
        ));
        assert!(matches!(
            store.await_reply("abc", Status::Request, "count").await,
            Err(PromiseError::NotAReply(Status::Request))
        ));
    }

    #[tokio::test]
    async fn report_failing_continuations() {
        let context = Arc::new(MemoryContextStore::new());
        let mut store = PromiseStore::new(context);
        store.continuation("broken", handler_fn(|_| async { Err("boom".into()) }));
        store.on_confirm("abc", "broken").await.unwrap();

        let result = store
            .try_resolve(&message("user.sync:confirmed", "abc"))
            .await;

        assert!(matches!(
            result,
            Err(PromiseError::ContinuationFailed { .. })
        ));
    }
}
