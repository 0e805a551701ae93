use super::Outcome;
use crate::domain::handler::BoxedHandler;
use crate::domain::message::Message;
use crate::library::wildcard::{variant_count, WildcardMatcher};
use crate::library::BoxedError;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Pattern which can not be registered
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid pattern {0:?}")]
pub struct InvalidPattern(String);

/// A non-silent binding failed while processing a message
#[derive(Debug, Error)]
#[error("binding {binding} failed to handle {namespace}")]
pub struct RegistryDispatchFailed {
    /// Display name of the first binding that failed
    pub binding: String,
    /// Namespace of the message being processed
    pub namespace: String,
    /// Error returned by the binding
    #[source]
    pub source: BoxedError,
}

/// Handler registered under a pattern
pub struct Binding {
    handler: BoxedHandler,
    name: String,
    silent: bool,
}

impl Binding {
    /// Display name of the binding
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether failures of this binding are tolerated
    pub fn is_silent(&self) -> bool {
        self.silent
    }
}

/// Table of handlers keyed by namespace patterns
///
/// Patterns may contain `*` wildcards and `{a|b}` alternations. A message is handled
/// by all bindings of the single best matching pattern, in registration order.
#[derive(Default)]
pub struct Registry {
    bindings: BTreeMap<String, Vec<Binding>>,
    matcher: WildcardMatcher,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the bindings of a pattern
    ///
    /// Patterns that are empty, contain whitespace, or expand into more than
    /// [`MAX_VARIANTS`](crate::library::wildcard::MAX_VARIANTS) variants are rejected.
    pub fn register(
        &mut self,
        pattern: impl Into<String>,
        handler: BoxedHandler,
        name: impl Into<String>,
    ) -> Result<&mut Self, InvalidPattern> {
        self.insert(pattern.into(), handler, name.into(), false)
    }

    /// Appends a handler whose failures neither consume the message nor fail the dispatch
    pub fn register_silent(
        &mut self,
        pattern: impl Into<String>,
        handler: BoxedHandler,
        name: impl Into<String>,
    ) -> Result<&mut Self, InvalidPattern> {
        self.insert(pattern.into(), handler, name.into(), true)
    }

    fn insert(
        &mut self,
        pattern: String,
        handler: BoxedHandler,
        name: String,
        silent: bool,
    ) -> Result<&mut Self, InvalidPattern> {
        if pattern.is_empty()
            || pattern.contains(char::is_whitespace)
            || variant_count(&pattern).is_none()
        {
            return Err(InvalidPattern(pattern));
        }

        self.bindings
            .entry(pattern)
            .or_default()
            .push(Binding { handler, name, silent });

        Ok(self)
    }

    /// Whether no handler has been registered at all
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings of the pattern matching the namespace best, empty if none matches
    pub fn get(&self, namespace: &str) -> &[Binding] {
        self.matcher
            .resolve(namespace, self.bindings.iter())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Runs all bindings matching the message
    ///
    /// Every binding is executed even if an earlier one failed. The first failure of a
    /// non-silent binding is reported once all of them ran.
    pub async fn run(&self, message: &Message) -> Result<Outcome, RegistryDispatchFailed> {
        let mut outcome = Outcome::default();
        let mut failure: Option<(String, BoxedError)> = None;

        for binding in self.get(&message.namespace) {
            debug!(binding = %binding.name, silent = binding.silent, "Running binding");

            if !binding.silent {
                outcome.consumed = true;
            }

            match binding.handler.handle(message).await {
                Ok(action) => outcome.actions.extend(action),
                Err(error) if binding.silent => {
                    warn!(binding = %binding.name, ?error, "Silent binding failed");
                }
                Err(error) => {
                    warn!(binding = %binding.name, ?error, "Binding failed");

                    if failure.is_none() {
                        failure = Some((binding.name.clone(), error));
                    }
                }
            }
        }

        match failure {
            Some((binding, source)) => {
                if !outcome.actions.is_empty() {
                    debug!(count = outcome.actions.len(), "Discarding actions of failed dispatch");
                }

                Err(RegistryDispatchFailed {
                    binding,
                    namespace: message.namespace.clone(),
                    source,
                })
            }
            None => Ok(outcome),
        }
    }
}
