use crate::domain::dispatch::Dispatcher;
use crate::domain::message::Message;
use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueProvider, RawQueueEntry,
};
use crate::library::EmptyResult;
use futures::StreamExt;
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// Inbox consumption parameters
pub struct Inbox {
    /// Stream holding the messages
    pub queue: QueueDescriptor,
    /// Group shared by all processes of the application
    pub group: ConsumerGroupDescriptor,
    /// Name of this process within the group
    pub consumer: String,
    /// Maximum duration a single read blocks
    pub block: Duration,
}

/// Reads entries from the inbox one at a time and dispatches them until the stream ends
///
/// Every entry that has been read is acknowledged after dispatching it, whether it could
/// be parsed and handled or not.
pub async fn consume<Q: QueueProvider>(
    provider: &Q,
    inbox: &Inbox,
    dispatcher: &Dispatcher,
) -> EmptyResult {
    let mut entries = provider
        .consume(&inbox.queue, &inbox.group, &inbox.consumer, 1, inbox.block)
        .await?;

    info!(
        queue = inbox.queue.key(),
        limit = inbox.queue.limit(),
        consumer = %inbox.consumer,
        "Consuming inbox"
    );

    while let Some(entry) = entries.next().await {
        match entry {
            Ok(entry) => process(entry, dispatcher).await,
            Err(error) => warn!(?error, "Failed to read from inbox"),
        }
    }

    Ok(())
}

async fn process<E: RawQueueEntry>(mut entry: E, dispatcher: &Dispatcher) {
    trace!(id = entry.id(), "Processing entry");

    match Message::make(entry.id(), entry.fields()) {
        Ok(message) => {
            // Errors have already been reported to the sender by the dispatcher
            if let Err(error) = dispatcher.dispatch(&message).await {
                warn!(id = %message.id, ?error, "Dispatch failed");
            }
        }
        Err(error) => warn!(?error, "Dropping malformed entry"),
    }

    if let Err(error) = entry.acknowledge().await {
        error!(id = entry.id(), ?error, "Failed to acknowledge entry");
    }
}
