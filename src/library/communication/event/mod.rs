//! Structures to consume queues of messages in a reliable and resilient way
//!
//! Messages are stored in a log-like data structure (usually of limited length where old elements are evicted).
//! When reading from this data structure, consumers may define a [`QueueLocation`] from
//! which they want to begin processing. All entries have to be acknowledged once
//! processing concludes. Upon crashing, the [`Consumer`](ConsumerIdentifier) may then
//! resume from the last acknowledged entry. This ensures that no [`QueueEntries`](RawQueueEntry)
//! are left unprocessed.
//!
//! Multiple [`Consumers`](ConsumerIdentifier) may share a [`ConsumerGroup`](ConsumerGroupDescriptor).
//! All participants in a group then collectively process the incoming stream where each entry is
//! assigned to only one consumer within the group.

mod consumer_group;
mod queue;
mod queue_provider;

pub use consumer_group::*;
pub use queue::*;
pub use queue_provider::*;
