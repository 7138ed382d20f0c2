//! Redis cache backend using deadpool-redis
//!
//! Works with any server speaking the Redis protocol (Redis, Valkey,
//! Dragonfly). URL format: `redis[s]://[user:password@]host:port[/db]`.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};

use super::backend::CacheBackend;
use super::error::CacheError;
use super::key::CacheKey;

const POOL_MAX_SIZE: usize = 32;
const POOL_TIMEOUT: Duration = Duration::from_secs(5);
const SCAN_BATCH: usize = 100;

pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Build the pool and verify the server answers PING
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let sanitized_url = sanitize_redis_url(redis_url);

        let mut config = Config::from_url(redis_url);
        config.pool = Some(deadpool_redis::PoolConfig {
            max_size: POOL_MAX_SIZE,
            timeouts: deadpool_redis::Timeouts {
                wait: Some(POOL_TIMEOUT),
                create: Some(POOL_TIMEOUT),
                recycle: Some(POOL_TIMEOUT),
            },
            ..Default::default()
        });
        let pool = config.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            CacheError::Connection(format!(
                "Failed to create Redis pool for {sanitized_url}: {e}"
            ))
        })?;

        let cache = Self { pool };
        cache.health_check().await.map_err(|e| {
            CacheError::Connection(format!("Redis PING failed for {sanitized_url}: {e}"))
        })?;

        tracing::debug!(url = %sanitized_url, "Redis cache connected");
        Ok(cache)
    }
}

/// Mask the password of a Redis URL for logging
///
/// Uses the last `@` so passwords containing `@` are masked whole.
pub(crate) fn sanitize_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
        if let Some(colon_pos) = url[scheme_end..at_pos].find(':') {
            let abs_colon = scheme_end + colon_pos;
            let prefix = &url[..abs_colon + 1];
            let suffix = &url[at_pos..];
            return format!("{prefix}***{suffix}");
        }
    }
    url.to_string()
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.pool.get().await?;
        let result: Option<Vec<u8>> = conn.get(key).await?;
        Ok(result)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        match ttl {
            Some(ttl) => {
                // PSETEX keeps sub-second TTLs; a zero TTL would never expire
                let ttl_ms: u64 = ttl.as_millis().try_into().unwrap_or(u64::MAX);
                let _: () = deadpool_redis::redis::cmd("PSETEX")
                    .arg(key)
                    .arg(ttl_ms.max(1))
                    .arg(value)
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn scan(&self, pattern: &CacheKey) -> Result<Vec<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        let glob = pattern.to_glob();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&glob)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            // Glob `*` also spans separators; keep segment semantics
            found.extend(keys.into_iter().filter(|k| pattern.matches(k)));

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once
        found.sort();
        found.dedup();
        Ok(found)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        deadpool_redis::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
