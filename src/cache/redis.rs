use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;

use super::{CacheError, CacheStore};

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Shared Redis cache; values are stored as JSON strings with `SETEX`
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn connect(url: &str, default_ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis cache at {}", url);
        Ok(Self { conn, default_ttl })
    }

    fn ttl_secs(&self, ttl: Option<Duration>) -> u64 {
        expiry_secs(ttl, self.default_ttl)
    }
}

/// SETEX seconds; sub-second TTLs round up to 1 since Redis rejects 0
fn expiry_secs(ttl: Option<Duration>, default_ttl: Duration) -> u64 {
    ttl.unwrap_or(default_ttl).as_secs().max(1)
}

// MSET cannot carry an expiry, so pipeline one SETEX per entry
fn mset_pipeline(entries: HashMap<String, Value>, secs: u64) -> Result<redis::Pipeline, CacheError> {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for (key, value) in entries {
        pipe.set_ex(key, serde_json::to_string(&value)?, secs).ignore();
    }
    Ok(pipe)
}

fn decode(raw: Option<String>) -> Result<Option<Value>, CacheError> {
    raw.map(|s| serde_json::from_str(&s)).transpose().map_err(Into::into)
}

#[async_trait]
impl CacheStore for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        decode(raw)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, raw, self.ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let raws: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        raws.into_iter().map(decode).collect()
    }

    async fn mset(&self, entries: HashMap<String, Value>, ttl: Option<Duration>) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let pipe = mset_pipeline(entries, self.ttl_secs(ttl))?;
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
