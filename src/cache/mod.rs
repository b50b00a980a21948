// Read-through response cache with in-process and Redis backends

pub mod key;
pub mod memory;
pub mod redis;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ApiError;
use crate::transform::to_object;

pub use key::{decode_cache_key, encode_cache_key, KEY_DELIMITER};
pub use memory::MemoryCache;
pub use self::redis::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key segment '{segment}' contains the key delimiter")]
    InvalidSegment { segment: String },

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value operations every cache backend provides
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value`; without a TTL the backend's default expiry applies
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn has(&self, key: &str) -> Result<bool, CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Values in key order; an empty key list never reaches the backend
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError>;

    /// Store every entry; an empty map is a no-op
    async fn mset(&self, entries: HashMap<String, Value>, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn replace_and_set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.del(key).await?;
        self.set(key, value, ttl).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Options for a read-through lookup
#[derive(Debug, Clone, Default)]
pub struct GetOrSet {
    pub key: String,
    pub ttl: Option<Duration>,
    /// Skip the lookup and always repopulate
    pub force: bool,
}

impl GetOrSet {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Response cache shared by every request; last writer wins
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.store.get(key).await
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store.set(key, value, ttl).await
    }

    pub async fn has(&self, key: &str) -> Result<bool, CacheError> {
        self.store.has(key).await
    }

    pub async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.store.del(key).await
    }

    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.store.mget(keys).await
    }

    /// Multi-get keyed by cache key; misses are left out
    pub async fn mget_map(&self, keys: &[String]) -> Result<Map<String, Value>, CacheError> {
        let values = self.mget(keys).await?;
        Ok(to_object(keys.iter().cloned(), values))
    }

    pub async fn mset(&self, entries: HashMap<String, Value>, ttl: Option<Duration>) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.store.mset(entries, ttl).await
    }

    pub async fn replace_and_set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store.replace_and_set(key, value, ttl).await
    }

    /// Return the cached value, or run `populate` once, store and return it.
    ///
    /// Concurrent callers on the same key may each populate; there is no
    /// single-flight. Cache failures propagate rather than falling back.
    pub async fn get_or_set<F, Fut, E>(&self, params: GetOrSet, populate: F) -> Result<Value, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Into<ApiError>,
    {
        if !params.force {
            if let Some(cached) = self.store.get(&params.key).await? {
                tracing::trace!("Cache hit: {}", params.key);
                return Ok(cached);
            }
        }

        tracing::trace!("Cache populate: {} (force: {})", params.key, params.force);
        let value = populate().await.map_err(Into::into)?;
        self.store.set(&params.key, value.clone(), params.ttl).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> ResponseCache {
        ResponseCache::new(Arc::new(MemoryCache::new(100, Duration::from_secs(60))))
    }

    #[tokio::test]
    async fn get_or_set_populates_once() {
        let cache = cache();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let populate = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(json!({ "id": "NODE_1" }))
        };

        let first = cache.get_or_set(GetOrSet::new("k"), populate).await.unwrap();
        let second = cache.get_or_set(GetOrSet::new("k"), populate).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn force_always_populates() {
        let cache = cache();
        cache.set("k", json!("stale"), None).await.unwrap();

        let fresh = cache
            .get_or_set(GetOrSet::new("k").force(true), || async { Ok::<_, ApiError>(json!("fresh")) })
            .await
            .unwrap();

        assert_eq!(fresh, json!("fresh"));
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("fresh")));
    }

    #[tokio::test]
    async fn del_invalidates_before_next_lookup() {
        let cache = cache();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let populate = move || async move {
            Ok::<_, ApiError>(json!(calls.fetch_add(1, Ordering::SeqCst)))
        };

        assert_eq!(cache.get_or_set(GetOrSet::new("k"), populate).await.unwrap(), json!(0));
        cache.del("k").await.unwrap();
        assert_eq!(cache.get_or_set(GetOrSet::new("k"), populate).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn populate_errors_are_not_cached() {
        let cache = cache();
        let err = cache
            .get_or_set(GetOrSet::new("k"), || async {
                Err::<Value, _>(ApiError::downstream(Some(404), "not found"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 404);
        assert!(!cache.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn multi_get_and_set() {
        let cache = cache();
        assert!(cache.mget(&[]).await.unwrap().is_empty());
        cache.mset(HashMap::new(), None).await.unwrap();

        cache
            .mset(
                HashMap::from([("a".to_string(), json!(1)), ("b".to_string(), json!(2))]),
                None,
            )
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
        assert_eq!(
            cache.mget(&keys).await.unwrap(),
            vec![Some(json!(1)), None, Some(json!(2))]
        );
        assert_eq!(
            Value::Object(cache.mget_map(&keys).await.unwrap()),
            json!({ "a": 1, "b": 2 })
        );
    }

    #[tokio::test]
    async fn replace_and_set_overwrites() {
        let cache = cache();
        cache.set("k", json!(1), None).await.unwrap();
        cache.replace_and_set("k", json!(2), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(2)));
    }
}
