//! Scoped key-value storage shared between all consumers of an application
//!
//! The store is used to keep small pieces of state alive across messages, e.g.
//! continuations waiting for a reply. Since the store may be shared by multiple
//! processes, [`ContextStore::pull`] provides an atomic read-and-clear primitive
//! which guarantees that only one caller observes a given value.

mod memory;

pub use memory::MemoryContextStore;

use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Key-value storage for textual values
#[async_trait]
pub trait ContextStore {
    /// Stores a value, replacing any previous one and expiring it after `ttl` if provided
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> EmptyResult;

    /// Retrieves a value if it exists
    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError>;

    /// Checks whether a value exists
    async fn has(&self, key: &str) -> Result<bool, BoxedError>;

    /// Removes a value, succeeding even if it did not exist
    async fn forget(&self, key: &str) -> EmptyResult;

    /// Atomically retrieves the value at `key` and, if it existed, removes it along with all `related` keys
    ///
    /// When multiple callers pull the same key concurrently, at most one of them receives the value.
    async fn pull(&self, key: &str, related: &[String]) -> Result<Option<String>, BoxedError>;
}

/// Dynamic dispatch version of [`ContextStore`]
pub type BoxedContextStore = Arc<dyn ContextStore + Send + Sync>;
