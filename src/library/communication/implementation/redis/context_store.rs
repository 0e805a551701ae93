use super::RedisFactory;
use crate::library::communication::context::ContextStore;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use lazy_static::lazy_static;
use redis::{AsyncCommands, Script};
use std::time::Duration;

lazy_static! {
    static ref PULL_SCRIPT: Script = Script::new(
        r"
        local value = redis.call('GET', KEYS[1])
        if value then
            redis.call('DEL', unpack(KEYS))
        end
        return value
        "
    );
}

/// [`ContextStore`] backed by redis, shared between all processes using the same scope
///
/// Every key is prefixed with `{scope}:` which commonly is the application slug.
pub struct RedisContextStore<F: RedisFactory + Send + Sync> {
    factory: F,
    scope: String,
}

impl<F: RedisFactory + Send + Sync> RedisContextStore<F> {
    /// Creates a new store within the given scope
    pub fn new(factory: F, scope: impl Into<String>) -> Self {
        Self {
            factory,
            scope: scope.into(),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }
}

#[async_trait]
impl<F: RedisFactory + Send + Sync> ContextStore for RedisContextStore<F> {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> EmptyResult {
        let mut con = self.factory.shared().await?;
        let key = self.scoped(key);

        match ttl {
            Some(ttl) => {
                let millis: usize = ttl.as_millis().try_into()?;
                con.pset_ex::<_, _, ()>(key, value, millis.max(1)).await?
            }
            None => con.set::<_, _, ()>(key, value).await?,
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError> {
        let mut con = self.factory.shared().await?;
        Ok(con.get(self.scoped(key)).await?)
    }

    async fn has(&self, key: &str) -> Result<bool, BoxedError> {
        let mut con = self.factory.shared().await?;
        Ok(con.exists(self.scoped(key)).await?)
    }

    async fn forget(&self, key: &str) -> EmptyResult {
        let mut con = self.factory.shared().await?;
        con.del::<_, ()>(self.scoped(key)).await?;
        Ok(())
    }

    async fn pull(&self, key: &str, related: &[String]) -> Result<Option<String>, BoxedError> {
        let mut con = self.factory.shared().await?;
        let mut invocation = PULL_SCRIPT.key(self.scoped(key));

        for related_key in related {
            invocation.key(self.scoped(related_key));
        }

        Ok(invocation.invoke_async(&mut con).await?)
    }
}
