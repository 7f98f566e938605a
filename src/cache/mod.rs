// Read-through cache with an in-memory fallback when Redis is not configured

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::counter;
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const SCAN_BATCH: usize = 100;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Deletes every key matching a glob pattern where `*` matches any run of characters
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::OperationFailed("cache lock poisoned".to_string())
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read().map_err(poisoned)?;
            match store.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        self.store.write().map_err(poisoned)?.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        let before = store.len();
        store.retain(|key, _| !glob_match(pattern, key));
        Ok((before - store.len()) as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.get(key).map(|entry| !entry.is_expired()).unwrap_or(false))
    }
}

/// Redis-backed cache sharing one multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(ttl.as_secs().max(1))
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                deleted += removed;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(exists)
    }
}

/// Matches `text` against a pattern where `*` stands for any (possibly empty) run of characters
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Builds `prefix:op[:k=v...]` with the parameters sorted by name
pub fn cache_key(prefix: &str, op: &str, params: &[(&str, String)]) -> String {
    let mut params: Vec<&(&str, String)> = params.iter().collect();
    params.sort_by(|a, b| a.0.cmp(b.0));

    let mut key = format!("{prefix}:{op}");
    for (name, value) in params {
        key.push(':');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}

/// Handle injected into services; cache failures never fail the caller
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    ttl: Option<Duration>,
    enabled: bool,
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Option<Duration>) -> Self {
        Self {
            backend,
            ttl,
            enabled: true,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCache::new()), None)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::in_memory()
        }
    }

    /// Builds the configured backend; an unreachable Redis falls back to memory
    pub async fn from_config(config: &AppConfig) -> Self {
        if !config.cache_enabled {
            info!("Cache disabled by configuration");
            return Self::disabled();
        }

        if config.cache_backend == "redis" {
            match RedisCache::connect(&config.redis_url).await {
                Ok(redis) => {
                    info!("Using Redis cache backend");
                    return Self::new(Arc::new(redis), config.cache_ttl());
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to Redis, falling back to in-memory cache")
                }
            }
        }

        Self::new(Arc::new(InMemoryCache::new()), config.cache_ttl())
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Returns the cached value for `key` or computes, stores and returns it.
    /// Errors from `compute` propagate and are never cached.
    pub async fn read_through<T, F, Fut>(&self, key: &str, compute: F) -> Result<T, ServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        if !self.enabled {
            return compute().await;
        }

        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!("ecommerce_cache.hits", 1);
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "Discarding corrupt cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "Cache read failed, reading through"),
        }
        counter!("ecommerce_cache.misses", 1);

        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.backend.set(key, &raw, self.ttl).await {
                    warn!(key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "Value could not be cached"),
        }
        Ok(value)
    }

    /// Drops the item key for `id` (when given) and every list and category key under `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str, id: Option<i32>) {
        if !self.enabled {
            return;
        }

        if let Some(id) = id {
            let key = cache_key(prefix, "id", &[("id", id.to_string())]);
            if let Err(e) = self.backend.delete(&key).await {
                warn!(key, error = %e, "Cache invalidation failed");
            }
        }

        for op in ["list", "category"] {
            let pattern = format!("{prefix}:{op}*");
            match self.backend.delete_pattern(&pattern).await {
                Ok(n) => debug!(pattern, deleted = n, "cache keys invalidated"),
                Err(e) => warn!(pattern, error = %e, "Cache invalidation failed"),
            }
        }
        counter!("ecommerce_cache.invalidations", 1);
    }
}
