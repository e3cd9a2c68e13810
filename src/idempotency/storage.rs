use crate::error::{AppError, Result};
use crate::observability::{get_metrics, LatencyTimer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a successful create, keyed by path and client key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub request_hash: String,
    pub resource_id: i64,
    pub saved_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(request_hash: impl Into<String>, resource_id: i64) -> Self {
        Self {
            request_hash: request_hash.into(),
            resource_id,
            saved_at: Utc::now(),
        }
    }
}

/// Key/record storage with per-entry time-to-live.
///
/// `get` returns `None` both for keys that were never written and for keys
/// whose TTL has elapsed. `set` overwrites unconditionally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>>;

    async fn set(&self, key: &str, record: IdempotencyRecord, ttl: Duration) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    record: IdempotencyRecord,
    expires_at: Instant,
}

/// In-process store backed by a concurrent map.
///
/// Expired entries are hidden on read and removed either lazily or by
/// [`MemoryIdempotencyStore::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryIdempotencyStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.record.clone()));
            }
        }

        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, record: IdempotencyRecord, ttl: Duration) -> Result<()> {
        let entry = StoredEntry {
            record,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }
}

/// Redis-backed store; expiry is delegated to Redis `EX`.
pub struct RedisIdempotencyStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisIdempotencyStore {
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Checks that the server answers.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let timer = LatencyTimer::new();
        let result: std::result::Result<Option<String>, redis::RedisError> = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.get(self.make_key(key)).await
        }
        .await;
        get_metrics().record_store_operation("redis", "get", timer.elapsed_ms(), result.is_ok());

        match result? {
            Some(json) => {
                let record = serde_json::from_str(&json).map_err(|e| {
                    AppError::StoreUnavailable(format!("Corrupt idempotency record: {}", e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, record: IdempotencyRecord, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(&record)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize record: {}", e)))?;

        let timer = LatencyTimer::new();
        let result: std::result::Result<(), redis::RedisError> = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.set_ex(self.make_key(key), json, ttl.as_secs().max(1)).await
        }
        .await;
        get_metrics().record_store_operation("redis", "set", timer.elapsed_ms(), result.is_ok());

        result.map_err(AppError::Redis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryIdempotencyStore::new();
        assert_eq!(store.get("/p:k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryIdempotencyStore::new();
        let record = IdempotencyRecord::new("abc", 7);
        store.set("/p:k", record.clone(), DAY).await.unwrap();

        assert_eq!(store.get("/p:k").await.unwrap(), Some(record));
        assert_eq!(store.get("/other:k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryIdempotencyStore::new();
        store.set("/p:k", IdempotencyRecord::new("a", 1), DAY).await.unwrap();
        store.set("/p:k", IdempotencyRecord::new("b", 2), DAY).await.unwrap();

        let record = store.get("/p:k").await.unwrap().unwrap();
        assert_eq!(record.resource_id, 2);
        assert_eq!(record.request_hash, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryIdempotencyStore::new();
        store.set("/p:k", IdempotencyRecord::new("a", 1), DAY).await.unwrap();

        tokio::time::advance(DAY - Duration::from_secs(1)).await;
        assert!(store.get("/p:k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("/p:k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryIdempotencyStore::new();
        store
            .set("/p:short", IdempotencyRecord::new("a", 1), Duration::from_secs(10))
            .await
            .unwrap();
        store.set("/p:long", IdempotencyRecord::new("b", 2), DAY).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("/p:long").await.unwrap().is_some());
    }

    #[test]
    fn test_record_serialization() {
        let record = IdempotencyRecord::new("deadbeef", 42);
        let json = serde_json::to_string(&record).unwrap();
        let back: IdempotencyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_redis_key_prefix() {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let store = RedisIdempotencyStore::new(client, "idem");
        assert_eq!(store.make_key("/api/v1/products:abc"), "idem:/api/v1/products:abc");
    }
}
