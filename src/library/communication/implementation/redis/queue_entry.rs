use crate::library::communication::event::RawQueueEntry;
use crate::library::EmptyResult;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamId;
use redis::{from_redis_value, AsyncCommands};
use std::collections::HashMap;

/// Redis based implementation of the [`RawQueueEntry`] trait
pub struct RedisQueueEntry {
    con: MultiplexedConnection,
    id: String,
    key: String,
    group: String,
    fields: HashMap<String, String>,
}

impl RedisQueueEntry {
    pub(super) fn new(
        con: MultiplexedConnection,
        entry: StreamId,
        key: String,
        group: String,
    ) -> Self {
        // Values that can not be represented as a string are dropped, which in turn
        // makes the entry malformed if a required field is affected.
        let fields = entry
            .map
            .iter()
            .filter_map(|(field, value)| {
                from_redis_value::<String>(value)
                    .ok()
                    .map(|value| (field.to_owned(), value))
            })
            .collect();

        Self {
            con,
            id: entry.id,
            key,
            group,
            fields,
        }
    }
}

#[async_trait]
impl RawQueueEntry for RedisQueueEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.con
            .xack::<_, _, _, ()>(&self.key, &self.group, &[&self.id])
            .await?;

        Ok(())
    }
}
