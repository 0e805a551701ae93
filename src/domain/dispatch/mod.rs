//! Routing of inbound messages to application code
//!
//! Every message passes through the following stages until one of them handles it:
//!
//! 1. [`PromiseStore`] resolving continuations of earlier requests
//! 2. [`Registry`] running pattern-matched bindings
//! 3. [`ListenerTable`] invoking the handler bound to the message name
//! 4. Replying with `unreachable` to the sender of a request nobody handled

mod dispatcher;
mod listener;
mod promise;
mod registry;

pub use dispatcher::*;
pub use listener::*;
pub use promise::*;
pub use registry::*;

use super::handler::Action;

/// Result of handing a message to a stage
#[derive(Debug, Default)]
pub struct Outcome {
    /// Whether the message has been handled
    pub consumed: bool,
    /// Follow-up work to run in the background
    pub actions: Vec<Action>,
}

impl Outcome {
    /// Schedules all actions on the runtime
    pub fn spawn_actions(self) {
        for action in self.actions {
            action.spawn();
        }
    }
}
