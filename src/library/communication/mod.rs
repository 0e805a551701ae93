//! Structures to communicate between applications in a distributed system
//!
//! Applications never talk to each other directly. Instead, every application owns a queue
//! (usually a log-like stream data structure) into which messages addressed to it are delivered.
//! Delivery itself is handled by a [`Relay`](relay::Relay) which knows where a message has to go.
//!
//! The receiving side consumes its queue through a [`QueueProvider`](event::QueueProvider) as part
//! of a [`ConsumerGroup`](event::ConsumerGroupDescriptor). All participants in a group collectively
//! process the incoming stream where each entry is assigned to only one consumer within the group
//! (effectively implementing load balancing and simple, dynamic scalability).
//!
//! State which has to outlive a single message, like continuations waiting for a reply,
//! is kept in a shared [`ContextStore`](context::ContextStore) so that any consumer of the
//! group may pick up where another one left off.

mod error;

pub mod context;
pub mod event;
pub mod implementation;
pub mod relay;

pub use error::BlackboxError;
