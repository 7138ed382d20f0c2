//! Cache backend trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;
use super::key::CacheKey;

/// Byte-level cache backend
///
/// Both the in-memory and the Redis backends implement this trait. Single
/// key operations are atomic; `scan` is a point-in-time snapshot that may
/// miss keys written concurrently.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value, expiring after `ttl` when given
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Remove a key. Returns `true` if it existed (best effort).
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// List every key matched by `pattern`
    async fn scan(&self, pattern: &CacheKey) -> Result<Vec<String>, CacheError>;

    async fn health_check(&self) -> Result<(), CacheError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
