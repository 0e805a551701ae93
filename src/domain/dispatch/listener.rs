use crate::domain::address::{validate_name, AddressError};
use crate::domain::handler::BoxedHandler;
use crate::domain::message::{listener_binding_key, Message, DEFAULT_LISTENER_ROOT};
use std::collections::HashMap;

/// Startup-time table resolving message names to a single handler each
///
/// Handlers are keyed by the listener binding key of the name they are bound to,
/// e.g. `App\Outpost\User\Sync` for `user.sync`.
pub struct ListenerTable {
    root: String,
    bindings: HashMap<String, BoxedHandler>,
}

impl ListenerTable {
    /// Creates an empty table below the given root
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bindings: HashMap::new(),
        }
    }

    /// Binds a handler to a name, replacing any previous binding
    pub fn bind(&mut self, name: &str, handler: BoxedHandler) -> Result<&mut Self, AddressError> {
        validate_name(name)?;

        self.bindings
            .insert(listener_binding_key(&self.root, name), handler);

        Ok(self)
    }

    /// Handler bound to the name of the message, if any
    pub fn resolve(&self, message: &Message) -> Option<&BoxedHandler> {
        self.bindings.get(&message.listener_binding_key(&self.root))
    }

    /// Root prefixed to every binding key
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Keys of all bound handlers
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl Default for ListenerTable {
    fn default() -> Self {
        Self::new(DEFAULT_LISTENER_ROOT)
    }
}
