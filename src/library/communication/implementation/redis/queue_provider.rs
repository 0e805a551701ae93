use super::{RedisFactory, RedisQueueEntry, STREAM_ID_ADDITIONS, STREAM_ID_HEAD, STREAM_ID_TAIL};
use crate::library::backoff::Backoff;
use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueLocation, QueueProvider,
};
use crate::library::BoxedError;
use async_trait::async_trait;
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use redis::aio::{Connection, ConnectionLike};
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

const BUSY_GROUP: &str = "BUSYGROUP";

/// Queue provider implementation using [Redis Streams](https://redis.io/topics/streams-intro)
pub struct RedisQueueProvider<F: RedisFactory + Send + Sync> {
    factory: F,
}

impl<F: RedisFactory + Send + Sync> RedisQueueProvider<F> {
    /// Creates a new instance with a given [`RedisFactory`]
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> QueueProvider for RedisQueueProvider<F>
where
    F: RedisFactory + Send + Sync,
{
    type Entry = RedisQueueEntry;

    /// Consumes a redis stream data structure using the following steps:
    ///
    /// 1. Create the stream and/or consumer group if it does not exist
    /// 2. Start streaming entries from the PEL until the queue head is reached
    /// 3. Wait for and stream new entries in a blocking manner, waiting at most `block` per read
    ///
    /// Read errors are yielded as stream items and the read is retried after a backoff,
    /// thus the returned stream never terminates on its own.
    async fn consume(
        &self,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        batch_size: usize,
        block: Duration,
    ) -> Result<BoxStream<'static, Result<Self::Entry, BoxedError>>, BoxedError> {
        let key = queue.key().to_owned();

        // Create a redis connection for the blocking XREADGROUP command
        let mut con = self.factory.owned().await?;

        create_consumer_group(&mut con, &key, group).await?;

        let read_options = StreamReadOptions::default()
            .group(group.identifier(), consumer)
            .count(batch_size)
            .block(block.as_millis().try_into().unwrap_or(usize::MAX));

        // Shared connection used by the entries for acknowledgement
        let ack_con = self.factory.shared().await?;
        let group = group.identifier().to_owned();
        let entry_key = key.clone();

        let stream = xread_stream(con, read_options, key)
            .map(move |entry| {
                let entry = entry?;
                Ok(RedisQueueEntry::new(
                    ack_con.clone(),
                    entry,
                    entry_key.clone(),
                    group.clone(),
                ))
            })
            .boxed();

        Ok(stream)
    }
}

async fn create_consumer_group<C: ConnectionLike + Send>(
    con: &mut C,
    key: &str,
    group: &ConsumerGroupDescriptor,
) -> RedisResult<()> {
    let start_id = match group.start() {
        QueueLocation::Head => STREAM_ID_HEAD,
        QueueLocation::Tail => STREAM_ID_TAIL,
    };

    let result = con
        .xgroup_create_mkstream::<_, _, _, ()>(key, group.identifier(), start_id)
        .await;

    match result {
        Err(e) if e.code() == Some(BUSY_GROUP) => {
            trace!(key, group = group.identifier(), "Consumer group already exists");
            Ok(())
        }
        other => other,
    }
}

/// Cursor to read from after receiving a batch whose last entry has the given id
///
/// The pending entries list is replayed starting at the head. Once a read returns no
/// pending entries, reading continues with entries never delivered to any consumer.
fn next_cursor<'a>(cursor: &'a str, last_id: Option<&'a str>) -> &'a str {
    if cursor == STREAM_ID_ADDITIONS {
        return cursor;
    }

    last_id.unwrap_or(STREAM_ID_ADDITIONS)
}

struct ReadState {
    con: Connection,
    options: StreamReadOptions,
    cursor: String,
    backoff: Backoff,
}

fn xread_stream(
    con: Connection,
    options: StreamReadOptions,
    key: String,
) -> BoxStream<'static, RedisResult<StreamId>> {
    let state = ReadState {
        con,
        options,
        cursor: STREAM_ID_HEAD.to_string(),
        backoff: Backoff::default(),
    };

    let stream = stream::unfold(state, move |mut state| {
        let key = key.to_owned();

        async move {
            let result = state
                .con
                .xread_options::<_, _, StreamReadReply>(&[&key], &[&state.cursor], &state.options)
                .await;

            match result {
                Ok(mut reply) => {
                    state.backoff.reset();

                    // Timeouts of the blocking read yield an empty reply
                    let ids = reply.keys.pop().map(|stream| stream.ids).unwrap_or_default();

                    let cursor = next_cursor(&state.cursor, ids.last().map(|entry| entry.id.as_str()));

                    if cursor != state.cursor {
                        if cursor == STREAM_ID_ADDITIONS {
                            debug!(key = %key, "Pending entries drained");
                        }

                        state.cursor = cursor.to_owned();
                    }

                    Some((Ok(ids), state))
                }
                Err(e) => {
                    let delay = state
                        .backoff
                        .next()
                        .unwrap_or_else(|| state.backoff.ceiling());

                    warn!(error = %e, ?delay, "Failed to read from redis stream");
                    sleep(delay).await;

                    Some((Err(e), state))
                }
            }
        }
    });

    // It is possible to stream in batches (receiving multiple entries from the redis)
    // by setting the options.count value >1. The resulting stream will still yield
    // one at a time to make it easier to use.
    stream
        .flat_map(|result| match result {
            Ok(batch) => stream::iter(batch).map(Ok).boxed(),
            Err(e) => stream::once(async { Err(e) }).boxed(),
        })
        .boxed()
}
