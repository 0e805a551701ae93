use super::ContextStore;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_alive(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() < deadline)
            .unwrap_or(true)
    }
}

/// [`ContextStore`] implementation living in the memory of the current process
///
/// Useful for single-process deployments and tests. Pulls are atomic within the process.
#[derive(Default)]
pub struct MemoryContextStore {
    values: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryContextStore {
    /// Creates a new, empty instance
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredValue>>, BoxedError> {
        self.values
            .lock()
            .map_err(|_| "context store lock has been poisoned".into())
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> EmptyResult {
        let stored = StoredValue {
            value: value.to_owned(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        self.lock()?.insert(key.to_owned(), stored);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError> {
        Ok(self
            .lock()?
            .get(key)
            .filter(|stored| stored.is_alive())
            .map(|stored| stored.value.clone()))
    }

    async fn has(&self, key: &str) -> Result<bool, BoxedError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn forget(&self, key: &str) -> EmptyResult {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn pull(&self, key: &str, related: &[String]) -> Result<Option<String>, BoxedError> {
        let mut values = self.lock()?;

        let value = match values.remove(key) {
            Some(stored) if stored.is_alive() => stored.value,
            _ => return Ok(None),
        };

        for related_key in related {
            values.remove(related_key);
        }

        Ok(Some(value))
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[tokio::test]
    async fn store_and_retrieve() {
        let store = MemoryContextStore::new();
        store.put("key", "value", None).await.unwrap();

        assert_eq!(store.get("key").await.unwrap(), Some("value".into()));
        assert!(store.has("key").await.unwrap());
    }

    #[tokio::test]
    async fn forget_values() {
        let store = MemoryContextStore::new();
        store.put("key", "value", None).await.unwrap();
        store.forget("key").await.unwrap();
        store.forget("missing").await.unwrap();

        assert!(!store.has("key").await.unwrap());
    }

    #[tokio::test]
    async fn expire_values() {
        let store = MemoryContextStore::new();
        store
            .put("key", "value", Some(Duration::from_millis(0)))
            .await
            .unwrap();

        assert_eq!(store.get("key").await.unwrap(), None);
        assert_eq!(store.pull("key", &[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn pull_once_and_clear_related() {
        let store = MemoryContextStore::new();
        store.put("a", "1", None).await.unwrap();
        store.put("b", "2", None).await.unwrap();
        store.put("c", "3", None).await.unwrap();

        let related = vec!["b".to_owned()];
        assert_eq!(store.pull("a", &related).await.unwrap(), Some("1".into()));
        assert_eq!(store.pull("a", &related).await.unwrap(), None);

        assert!(!store.has("b").await.unwrap());
        assert!(store.has("c").await.unwrap());
    }

    #[tokio::test]
    async fn leave_related_untouched_when_missing() {
        let store = MemoryContextStore::new();
        store.put("b", "2", None).await.unwrap();

        let related = vec!["b".to_owned()];
        assert_eq!(store.pull("a", &related).await.unwrap(), None);
        assert!(store.has("b").await.unwrap());
    }
}
