//! Session cache
//!
//! Redis through a bb8 pool when the server is reachable at startup,
//! otherwise an in-process TTL map so the service keeps working without it.

use bb8_redis::bb8::Pool;
use bb8_redis::redis::{self, AsyncCommands};
use bb8_redis::RedisConnectionManager;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::shared::errors::{AppError, Result};

pub type RedisPool = Pool<RedisConnectionManager>;

/// Lifetime of a cached conversation pointer
pub const CONVERSATION_TTL_SECS: u64 = 3600;

/// Cache keys
pub mod keys {
    pub fn conversation_key(session_id: &str) -> String {
        format!("conversation:{}", session_id)
    }
}

/// What the cache remembers about a session's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCacheEntry {
    pub conversation_id: String,
    pub guest_id: String,
    pub last_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Redis => "redis",
            CacheBackend::Memory => "memory",
        }
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Clone)]
enum Store {
    Redis(RedisPool),
    Memory(Arc<DashMap<String, MemoryEntry>>),
}

/// Key/value cache with per-key expiry
#[derive(Clone)]
pub struct SessionCache {
    store: Store,
}

impl SessionCache {
    /// Connect to Redis, falling back to memory when it cannot be reached
    pub async fn connect(redis_url: &str) -> Self {
        match Self::connect_redis(redis_url).await {
            Ok(cache) => {
                tracing::info!("Connected to Redis cache");
                cache
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, using in-memory cache");
                Self::in_memory()
            }
        }
    }

    /// Connect to Redis and verify it answers PING
    pub async fn connect_redis(redis_url: &str) -> Result<Self> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|e| AppError::Cache(format!("Invalid Redis URL: {}", e)))?;
        let pool = Pool::builder()
            .connection_timeout(Duration::from_secs(2))
            .build(manager)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to build Redis pool: {}", e)))?;

        let cache = Self {
            store: Store::Redis(pool),
        };
        cache.ping().await?;
        Ok(cache)
    }

    pub fn in_memory() -> Self {
        Self {
            store: Store::Memory(Arc::new(DashMap::new())),
        }
    }

    pub fn backend(&self) -> CacheBackend {
        match self.store {
            Store::Redis(_) => CacheBackend::Redis,
            Store::Memory(_) => CacheBackend::Memory,
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match &self.store {
            Store::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to get Redis connection: {}", e)))?;
                let pong: String = redis::cmd("PING")
                    .query_async(&mut *conn)
                    .await
                    .map_err(|e| AppError::Cache(format!("Redis ping failed: {}", e)))?;
                if pong == "PONG" {
                    Ok(())
                } else {
                    Err(AppError::Cache(format!("Unexpected ping reply: {}", pong)))
                }
            }
            Store::Memory(_) => Ok(()),
        }
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        match &self.store {
            Store::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to get Redis connection: {}", e)))?;
                let _: () = conn
                    .set_ex(key, value, ttl_secs)
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to set {}: {}", key, e)))?;
            }
            Store::Memory(map) => {
                map.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: value.to_string(),
                        expires_at: Instant::now() + Duration::from_secs(ttl_secs),
                    },
                );
            }
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match &self.store {
            Store::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to get Redis connection: {}", e)))?;
                conn.get(key)
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to get {}: {}", key, e)))
            }
            Store::Memory(map) => {
                let now = Instant::now();
                let value = map
                    .get(key)
                    .filter(|entry| entry.expires_at > now)
                    .map(|entry| entry.value.clone());
                if value.is_none() {
                    map.remove_if(key, |_, entry| entry.expires_at <= now);
                }
                Ok(value)
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match &self.store {
            Store::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to get Redis connection: {}", e)))?;
                let _: () = conn
                    .del(key)
                    .await
                    .map_err(|e| AppError::Cache(format!("Failed to delete {}: {}", key, e)))?;
            }
            Store::Memory(map) => {
                map.remove(key);
            }
        }
        Ok(())
    }

    /// Remember the conversation a session is currently in
    pub async fn store_conversation(&self, session_id: &str, entry: &ConversationCacheEntry) -> Result<()> {
        let data = serde_json::to_string(entry)?;
        self.set_ex(&keys::conversation_key(session_id), &data, CONVERSATION_TTL_SECS)
            .await
    }

    pub async fn conversation(&self, session_id: &str) -> Result<Option<ConversationCacheEntry>> {
        match self.get(&keys::conversation_key(session_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
