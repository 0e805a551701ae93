use crate::library::BoxedError;
use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::lock::Mutex;
use futures::FutureExt;
use redis::aio::{Connection, MultiplexedConnection};
use redis::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, trace, warn};

const RETRY_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Factory for redis connections
#[async_trait]
pub trait RedisFactory {
    /// Establishes a new, standalone connection
    ///
    /// Consumers are free to run long-running, blocking operations on these
    /// connections as they are not shared with anybody else.
    async fn owned(&self) -> Result<Connection, BoxedError>;

    /// Retrieves a handle to a connection shared with all other users of this factory
    ///
    /// Blocking commands must not be issued on shared connections.
    async fn shared(&self) -> Result<MultiplexedConnection, BoxedError>;
}

#[async_trait]
impl<T: RedisFactory + Send + Sync> RedisFactory for Arc<T> {
    async fn owned(&self) -> Result<Connection, BoxedError> {
        (**self).owned().await
    }

    async fn shared(&self) -> Result<MultiplexedConnection, BoxedError> {
        (**self).shared().await
    }
}

type SharedConnectionFuture = Shared<BoxFuture<'static, MultiplexedConnection>>;

/// [`RedisFactory`] implementation which retries connecting until the server becomes available
pub struct RedisConnectionFactory {
    client: Client,
    shared: Mutex<Option<SharedConnectionFuture>>,
}

impl RedisConnectionFactory {
    /// Creates a new factory opening connections to the given URL
    pub fn new(url: &str) -> Result<Self, BoxedError> {
        Ok(Self {
            client: Client::open(url)?,
            shared: Mutex::new(None),
        })
    }

    #[instrument(skip(client))]
    async fn connect_standalone(client: Client) -> Connection {
        let mut attempt = 0;

        loop {
            trace!(attempt, "Connecting to redis");

            match timeout(REQUEST_TIMEOUT, client.get_async_connection()).await {
                Ok(Ok(connection)) => return connection,
                Ok(Err(error)) => warn!(?error, "Failed to connect to redis"),
                Err(error) => warn!(?error, "Timeout connecting to redis"),
            }

            sleep(RETRY_INTERVAL).await;
            attempt += 1;
        }
    }

    #[instrument(skip(client))]
    async fn connect_shared(client: Client) -> MultiplexedConnection {
        let mut attempt = 0;

        loop {
            trace!(attempt, "Connecting to redis");

            match timeout(REQUEST_TIMEOUT, client.get_multiplexed_tokio_connection()).await {
                Ok(Ok(connection)) => return connection,
                Ok(Err(error)) => warn!(?error, "Failed to connect to redis"),
                Err(error) => warn!(?error, "Timeout connecting to redis"),
            }

            sleep(RETRY_INTERVAL).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl RedisFactory for RedisConnectionFactory {
    async fn owned(&self) -> Result<Connection, BoxedError> {
        debug!("Instantiating new standalone redis connection");
        Ok(Self::connect_standalone(self.client.clone()).await)
    }

    async fn shared(&self) -> Result<MultiplexedConnection, BoxedError> {
        let future = {
            let mut shared = self.shared.lock().await;

            match &*shared {
                Some(future) => {
                    trace!("Reusing existing shared connection");
                    future.clone()
                }
                None => {
                    debug!("Instantiating shared redis connection");
                    let future = Self::connect_shared(self.client.clone()).boxed().shared();
                    *shared = Some(future.clone());
                    future
                }
            }
        };

        Ok(future.await)
    }
}
