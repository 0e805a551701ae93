use super::QueueLocation;

/// Definition of a consumer group
///
/// In a message queue, a group of consumers collaborates to consume messages.
/// Each message is only delivered to one consumer within the same group, identified
/// by its name. When it is created, the group starts processing messages
/// from the provided [`QueueLocation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupDescriptor {
    identifier: String,
    start: QueueLocation,
}

impl ConsumerGroupDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(identifier: impl Into<String>, start: QueueLocation) -> Self {
        Self {
            identifier: identifier.into(),
            start,
        }
    }

    /// Unique identifier of the group
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Location from where a consumer group begins to consume messages
    ///
    /// Note that it is not guaranteed that this will be honored (e.g. when the group already exists)!
    pub fn start(&self) -> &QueueLocation {
        &self.start
    }
}

/// Unique identifier of a consumer within a [`ConsumerGroup`](ConsumerGroupDescriptor)
pub type ConsumerIdentifier = String;
