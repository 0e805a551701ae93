use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueProvider, RawQueueEntry,
};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Entry handed out by [`MockQueueProvider`]
pub struct MockQueueEntry {
    id: String,
    fields: HashMap<String, String>,
    acknowledged: Arc<AtomicUsize>,
}

#[async_trait]
impl RawQueueEntry for MockQueueEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Queue provider that yields a fixed set of entries once and then ends the stream
#[derive(Default)]
pub struct MockQueueProvider {
    entries: Mutex<Vec<(String, HashMap<String, String>)>>,
    acknowledged: Arc<AtomicUsize>,
    consumed: AtomicUsize,
}

impl MockQueueProvider {
    /// Creates a provider without entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry with the given fields
    pub fn with_entry<'a>(self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            let id = format!("{}-0", entries.len() + 1);
            let fields = fields
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();

            entries.push((id, fields));
        }

        self
    }

    /// Number of entries acknowledged so far
    pub fn acknowledged(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Number of entries handed out so far
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueProvider for MockQueueProvider {
    type Entry = MockQueueEntry;

    async fn consume(
        &self,
        _queue: &QueueDescriptor,
        _group: &ConsumerGroupDescriptor,
        _consumer: &str,
        _batch_size: usize,
        _block: Duration,
    ) -> Result<BoxStream<'static, Result<Self::Entry, BoxedError>>, BoxedError> {
        let entries = std::mem::take(&mut *self.entries.lock().map_err(|_| "poisoned")?);
        let acknowledged = self.acknowledged.clone();

        self.consumed.fetch_add(entries.len(), Ordering::SeqCst);

        let entries = entries.into_iter().map(move |(id, fields)| {
            Ok(MockQueueEntry {
                id,
                fields,
                acknowledged: acknowledged.clone(),
            })
        });

        Ok(stream::iter(entries).boxed())
    }
}
