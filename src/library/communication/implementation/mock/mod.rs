//! In-memory implementations of the communication seams for use in tests

mod queue_provider;
mod relay;

pub use queue_provider::*;
pub use relay::*;
