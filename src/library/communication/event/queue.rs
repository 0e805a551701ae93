use crate::library::EmptyResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Describes a message queue and its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDescriptor {
    key: String,
    limit: usize,
}

impl QueueDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(key: String, limit: usize) -> Self {
        Self { key, limit }
    }

    /// Value which may be used by queue implementations to identify a queue
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Maximum number of entries to be retained in the queue
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Location within the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueLocation {
    /// Start of the queue (not necessarily the first entry as a queue is limited in length)
    Head,
    /// End of the queue (exclusive of the last entry)
    Tail,
}

/// Entry retrieved from a [`Queue`](QueueDescriptor) providing its raw fields
#[async_trait]
pub trait RawQueueEntry {
    /// Identifier assigned to the entry by the queue, unique within the queue
    fn id(&self) -> &str;

    /// Fields of the item, values which are not representable as text are omitted
    fn fields(&self) -> &HashMap<String, String>;

    /// Acknowledge the item as processed
    async fn acknowledge(&mut self) -> EmptyResult;
}
