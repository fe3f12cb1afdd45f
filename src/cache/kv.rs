//! Key-value backends for the hosted cache store.
//!
//! [`HostedStore`](super::HostedStore) only ever stores small JSON documents
//! (a hosted URL or permanent-state flags), so the backend contract is plain
//! string get/set/delete.
//!
//! - [`MemoryKeyValue`]: in-process moka cache. Suitable for a single
//!   instance and for tests; contents are lost on restart.
//! - [`RedisKeyValue`]: shared Redis/Valkey instance (feature `redis`).

use async_trait::async_trait;
use moka::future::Cache;

use crate::Result;

/// Default capacity of the in-process key-value backend.
const DEFAULT_MEMORY_MAX_ENTRIES: u64 = 100_000;

/// Minimal string key-value contract used by the hosted cache store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// In-process key-value backend on top of moka.
pub struct MemoryKeyValue {
    entries: Cache<String, String>,
}

impl MemoryKeyValue {
    /// Create a backend with the default max capacity (100,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MEMORY_MAX_ENTRIES)
    }

    /// Create a backend with a custom max capacity.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::new(max),
        }
    }
}

impl Default for MemoryKeyValue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).await.is_some())
    }
}

/// Redis/Valkey key-value backend.
///
/// Keys are namespaced with a prefix (default `huginn`) so the proxy can
/// share an instance with other services.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisKeyValue {
    client: redis::Client,
    key_prefix: String,
}

#[cfg(feature = "redis")]
impl RedisKeyValue {
    /// Create a backend for the given `redis://` URL.
    ///
    /// The connection is established lazily, per operation.
    pub fn new(url: &str, key_prefix: Option<String>) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            crate::HuginnError::Configuration(format!("invalid redis URL: {e}"))
        })?;
        Ok(Self {
            client,
            key_prefix: key_prefix.unwrap_or_else(|| "huginn".to_owned()),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl KeyValueStore for RedisKeyValue {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let _: () = conn.set(self.namespaced(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(self.namespaced(key)).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_set_get_delete() {
        let kv = MemoryKeyValue::new();
        assert!(kv.get("a").await.unwrap().is_none());

        kv.set("a", "1".into()).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));

        assert!(kv.delete("a").await.unwrap());
        assert!(!kv.delete("a").await.unwrap());
        assert!(kv.get("a").await.unwrap().is_none());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_rejects_invalid_url() {
        assert!(RedisKeyValue::new("not a url", None).is_err());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_namespaces_keys() {
        let kv = RedisKeyValue::new("redis://127.0.0.1:6379", Some("test".into())).unwrap();
        assert_eq!(kv.namespaced("images:abc"), "test:images:abc");
    }
}
