use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache; entries expire after their own TTL or the default
#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, Entry>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();
        Self { inner, default_ttl }
    }

    /// Evict expired entries on a fixed interval
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                inner.run_pending_tasks().await;
                tracing::trace!("Cache sweep: {} entries", inner.entry_count());
            }
        })
    }

    fn entry(&self, value: Value, ttl: Option<Duration>) -> Entry {
        Entry {
            value,
            ttl: ttl.unwrap_or(self.default_ttl),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.inner.insert(key.to_string(), self.entry(value, ttl)).await;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.contains_key(key))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.inner.get(key).await.map(|entry| entry.value));
        }
        Ok(values)
    }

    async fn mset(&self, entries: HashMap<String, Value>, ttl: Option<Duration>) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.inner.insert(key, self.entry(value, ttl)).await;
        }
        Ok(())
    }
}
