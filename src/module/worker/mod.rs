//! Consumes the inbox of an application and dispatches its messages
//!
//! Applications embed the worker by registering their handlers through
//! [`Worker::configure`] before handing it to a [`ModuleRunner`](crate::harness::ModuleRunner).

use crate::domain::dispatch::{Dispatcher, ListenerTable, PromiseStore, Registry};
use crate::domain::{BoxedHandler, Sender};
use crate::harness::{Heart, JobSet, Module};
use crate::library::communication::context::BoxedContextStore;
use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueLocation,
};
use crate::library::communication::implementation::redis::{
    inbox_key, RedisConnectionFactory, RedisContextStore, RedisFactory, RedisQueueProvider,
    StreamRelay,
};
use crate::library::communication::relay::{BoxedRelay, HttpRelay};
use crate::library::helpers::process_identity;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

mod consumer;
mod options;
mod ping;

pub use consumer::{consume, Inbox};
pub use options::{Options, RelayMode, RelayOptions};
pub use ping::{PingListener, PING};

#[derive(Debug, Error)]
enum WorkerError {
    #[error("worker has already been started")]
    AlreadyStarted,
}

/// Handlers made available to the dispatcher
pub struct Routes {
    /// Pattern based bindings
    pub registry: Registry,
    /// Name based bindings
    pub listeners: ListenerTable,
    continuations: Vec<(String, BoxedHandler)>,
    sender: Arc<Sender>,
}

impl Routes {
    /// Makes a promise continuation available under a name
    pub fn continuation(&mut self, name: impl Into<String>, handler: BoxedHandler) -> &mut Self {
        self.continuations.push((name.into(), handler));
        self
    }

    /// Sender which handlers may use to reply or send further messages
    pub fn sender(&self) -> Arc<Sender> {
        self.sender.clone()
    }
}

/// Module implementation
pub struct Worker {
    options: Options,
    factory: Arc<RedisConnectionFactory>,
    store: BoxedContextStore,
    routes: Option<Routes>,
}

impl Worker {
    /// Creates a new instance, without connecting to anything yet
    pub fn new(options: Options) -> Result<Self, BoxedError> {
        let factory = Arc::new(RedisConnectionFactory::new(&options.redis.url)?);

        let relay: BoxedRelay = match options.relay.mode {
            RelayMode::Http => Arc::new(HttpRelay::new(
                options.relay.basecamp.clone(),
                &options.app.slug,
                options.relay.relay_timeout,
            )?),
            RelayMode::Stream => Arc::new(StreamRelay::new(
                factory.clone(),
                options.relay.peers.clone(),
                options.relay.inbox_limit,
            )),
        };

        let store: BoxedContextStore =
            Arc::new(RedisContextStore::new(factory.clone(), options.app.slug.clone()));

        let sender = Arc::new(Sender::new(relay, options.app.slug.clone()));

        let mut listeners = ListenerTable::new(options.listener_root.clone());
        listeners.bind(PING, Arc::new(PingListener::new(sender.clone())))?;

        let routes = Routes {
            registry: Registry::new(),
            listeners,
            continuations: Vec::new(),
            sender,
        };

        Ok(Self {
            options,
            factory,
            store,
            routes: Some(routes),
        })
    }

    /// Registers application handlers
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut Routes),
    {
        if let Some(routes) = self.routes.as_mut() {
            configure(routes);
        }

        self
    }

    fn inbox(&self) -> Inbox {
        let slug = &self.options.app.slug;

        Inbox {
            queue: QueueDescriptor::new(inbox_key(slug), self.options.relay.inbox_limit),
            group: ConsumerGroupDescriptor::new(slug.as_str(), QueueLocation::Head),
            consumer: self
                .options
                .app
                .consumer
                .clone()
                .unwrap_or_else(process_identity),
            block: self.options.block,
        }
    }

    fn build_dispatcher(&mut self) -> Result<Dispatcher, WorkerError> {
        let routes = self.routes.take().ok_or(WorkerError::AlreadyStarted)?;

        let mut promises =
            PromiseStore::new(self.store.clone()).with_ttl(self.options.promise_ttl);

        for (name, handler) in routes.continuations {
            promises.continuation(name, handler);
        }

        Ok(Dispatcher::new(
            promises,
            routes.registry,
            routes.listeners,
            routes.sender,
        ))
    }
}

#[async_trait]
impl Module for Worker {
    async fn pre_startup(&mut self) -> EmptyResult {
        info!(url = %self.options.redis.url, "Connecting to redis");
        self.factory.shared().await?;
        Ok(())
    }

    async fn run(&mut self, jobs: &JobSet) -> Result<Option<Heart>, BoxedError> {
        let dispatcher = self.build_dispatcher()?;
        let provider = RedisQueueProvider::new(self.factory.clone());
        let inbox = self.inbox();

        let (heart, mut stone) = Heart::new();

        jobs.spawn("consumer", async move {
            match consume(&provider, &inbox, &dispatcher).await {
                Ok(()) => stone.kill("inbox stream ended").await,
                Err(error) => {
                    error!(?error, "Unable to consume inbox");
                    stone.kill("unable to consume inbox").await;
                }
            }
        })
        .await;

        Ok(Some(heart))
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::handler::{handler_fn, Action};
    use crate::domain::message::Message;
    use crate::domain::Address;
    use crate::library::communication::context::MemoryContextStore;
    use crate::library::communication::implementation::mock::{MockQueueProvider, MockRelay};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use structopt::StructOpt;

    fn inbox() -> Inbox {
        Inbox {
            queue: QueueDescriptor::new(inbox_key("user"), 100),
            group: ConsumerGroupDescriptor::new("user", QueueLocation::Head),
            consumer: "test".to_owned(),
            block: Duration::from_millis(10),
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> BoxedHandler {
        let counter = counter.clone();
        handler_fn(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
    }

    fn dispatcher(relay: &Arc<MockRelay>, registry: Registry) -> Dispatcher {
        let sender = Arc::new(Sender::new(relay.clone(), "user"));
        let mut listeners = ListenerTable::default();
        listeners
            .bind(PING, Arc::new(PingListener::new(sender.clone())))
            .unwrap();

        Dispatcher::new(
            PromiseStore::new(Arc::new(MemoryContextStore::new())),
            registry,
            listeners,
            sender,
        )
    }

    #[tokio::test]
    async fn acknowledge_every_entry() {
        let relay = Arc::new(MockRelay::new());
        let mut registry = Registry::new();
        registry
            .register(
                "user.sync:request",
                handler_fn(|_| async { Err("broken".into()) }),
                "broken",
            )
            .unwrap();

        let provider = MockQueueProvider::new()
            .with_entry(vec![("payload", "{}")])
            .with_entry(vec![("namespace", "user.sync:request"), ("payload", "{")])
            .with_entry(vec![
                ("namespace", "user.sync:request"),
                ("from", "billing"),
                ("correlation_id", "abc"),
            ])
            .with_entry(vec![("namespace", "user.sync:bogus")])
            .with_entry(vec![("namespace", "user.other:request"), ("from", "billing")]);

        consume(&provider, &inbox(), &dispatcher(&relay, registry))
            .await
            .unwrap();

        assert_eq!(provider.consumed(), 5);
        assert_eq!(provider.acknowledged(), provider.consumed());

        let namespaces: Vec<_> = relay
            .bodies()
            .iter()
            .map(|body| body["namespace"].as_str().unwrap_or_default().to_owned())
            .collect();
        assert_eq!(namespaces, vec!["user.sync:failed", "user.other:unreachable"]);
    }

    async fn explode(_: Message) -> Result<Option<Action>, BoxedError> {
        panic!("handler bug")
    }

    #[tokio::test]
    async fn keep_consuming_after_panicking_handler() {
        let relay = Arc::new(MockRelay::new());
        let mut registry = Registry::new();
        registry
            .register("user.boom:request", handler_fn(explode), "boom")
            .unwrap();

        let provider = MockQueueProvider::new()
            .with_entry(vec![
                ("namespace", "user.boom:request"),
                ("from", "billing"),
                ("correlation_id", "abc"),
            ])
            .with_entry(vec![("namespace", "user.boom:request"), ("from", "billing")]);

        consume(&provider, &inbox(), &dispatcher(&relay, registry))
            .await
            .unwrap();

        assert_eq!(provider.consumed(), 2);
        assert_eq!(provider.acknowledged(), 2);

        let bodies = relay.bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["namespace"], "user.boom:failed");
    }

    #[tokio::test]
    async fn route_wildcards_and_exact_matches() {
        let wildcard = Arc::new(AtomicUsize::new(0));
        let exact = Arc::new(AtomicUsize::new(0));
        let relay = Arc::new(MockRelay::new());

        let mut registry = Registry::new();
        registry
            .register("user.*:request", counting(&wildcard), "wildcard")
            .unwrap();

        let provider =
            MockQueueProvider::new().with_entry(vec![("namespace", "user.sync:request")]);
        consume(&provider, &inbox(), &dispatcher(&relay, registry))
            .await
            .unwrap();

        assert_eq!(wildcard.load(Ordering::SeqCst), 1);

        let mut registry = Registry::new();
        registry
            .register("user.*:request", counting(&wildcard), "wildcard")
            .unwrap()
            .register("user.sync:request", counting(&exact), "exact")
            .unwrap();

        let provider =
            MockQueueProvider::new().with_entry(vec![("namespace", "user.sync:request")]);
        consume(&provider, &inbox(), &dispatcher(&relay, registry))
            .await
            .unwrap();

        assert_eq!(wildcard.load(Ordering::SeqCst), 1);
        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert!(relay.posted().is_empty());
    }

    #[tokio::test]
    async fn answer_pings() {
        let relay = Arc::new(MockRelay::new());

        let provider = MockQueueProvider::new().with_entry(vec![
            ("namespace", "outpost.ping:request"),
            ("from", "monitor"),
            ("correlation_id", "abc"),
        ]);

        consume(&provider, &inbox(), &dispatcher(&relay, Registry::new()))
            .await
            .unwrap();

        let bodies = relay.bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["namespace"], "outpost.ping:confirmed");
        assert_eq!(bodies[0]["to"], json!(["monitor"]));
        assert_eq!(bodies[0]["payload"]["app"], "user");
    }

    #[tokio::test]
    async fn configure_routes() {
        let options = Options::from_iter_safe(&["worker", "--app", "user"]).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut worker = Worker::new(options)
            .unwrap()
            .configure(|routes| {
                routes
                    .registry
                    .register("user.*:request", counting(&counter), "sync")
                    .unwrap();
                routes.continuation("done", counting(&counter));

                assert_eq!(routes.sender().origin(), "user");
            });

        let inbox = worker.inbox();
        assert_eq!(inbox.queue.key(), "outpost:user");
        assert_eq!(inbox.group.identifier(), "user");

        assert!(worker.build_dispatcher().is_ok());
        assert!(worker.build_dispatcher().is_err());
    }

    #[tokio::test]
    async fn resolve_promises_end_to_end() {
        let relay = Arc::new(MockRelay::new());
        let resolved = Arc::new(AtomicUsize::new(0));

        let sender = Arc::new(Sender::new(relay.clone(), "user"));
        let mut promises = PromiseStore::new(Arc::new(MemoryContextStore::new()));
        promises.continuation("synced", counting(&resolved));

        let request = sender
            .request(Address::new().to(["billing"]).named("user.sync"), json!({}))
            .await
            .unwrap();
        let correlation_id = request.correlation_id.unwrap();
        promises.on_confirm(&correlation_id, "synced").await.unwrap();

        let dispatcher = Dispatcher::new(promises, Registry::new(), ListenerTable::default(), sender);
        let provider = MockQueueProvider::new()
            .with_entry(vec![
                ("namespace", "user.sync:confirmed"),
                ("from", "billing"),
                ("correlation_id", correlation_id.as_str()),
            ])
            .with_entry(vec![
                ("namespace", "user.sync:confirmed"),
                ("from", "billing"),
                ("correlation_id", correlation_id.as_str()),
            ]);

        consume(&provider, &inbox(), &dispatcher).await.unwrap();

        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.promises().is_pending(&correlation_id).await.unwrap());
        assert_eq!(provider.acknowledged(), 2);
    }
}
