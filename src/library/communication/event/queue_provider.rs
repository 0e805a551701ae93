use super::{ConsumerGroupDescriptor, QueueDescriptor, RawQueueEntry};
use crate::library::BoxedError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// Allows consumption of queues using [consumer groups](ConsumerGroupDescriptor)
#[async_trait]
pub trait QueueProvider {
    /// Type of [`RawQueueEntry`] returned by the provider
    type Entry: RawQueueEntry + Send + Sync;

    /// Subscribes to new entries on a given queue joining the specified [`ConsumerGroup`](ConsumerGroupDescriptor)
    /// with the given [`ConsumerIdentifier`](super::ConsumerIdentifier) or creates it if it does not exist.
    ///
    /// Reads wait at most `block` for new entries before trying again, the returned stream only
    /// ends when the provider is unable to continue. Transient read failures are yielded as errors.
    async fn consume(
        &self,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str, // &ConsumerIdentifier
        batch_size: usize,
        block: Duration,
    ) -> Result<BoxStream<'static, Result<Self::Entry, BoxedError>>, BoxedError>;
}
