//! Outpost specific structures, implementations, and logic
//!
//! Messages arrive as [`Message`](message::Message) envelopes, are routed by the
//! [`Dispatcher`](dispatch::Dispatcher) and answered through the [`Sender`](sender::Sender).

pub mod address;
pub mod dispatch;
pub mod handler;
pub mod message;
pub mod sender;

pub use address::Address;
pub use handler::{handler_fn, Action, BoxedHandler, Handler};
pub use message::{Message, Status};
pub use sender::Sender;
