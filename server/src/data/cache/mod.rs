//! Cache module
//!
//! Pluggable byte-level backends (moka in-memory, Redis via deadpool-redis)
//! behind [`BaseCache`], which adds typed MessagePack values, scoped tracing
//! spans and the repository error mapping used by the cached repositories.

mod backend;
mod error;
mod key;
mod memory;
mod redis;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::{CacheKey, KEY_SEPARATOR, KeyPart, WILDCARD, Wildcard};
pub use memory::InMemoryCache;
pub use redis::RedisCache;

use crate::core::config::{CacheBackendType, CacheConfig};
use crate::data::error::{ConfigError, RepositoryError};

/// How cache failures on the read path are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ReadPolicy {
    /// Cache failures fail the read
    #[default]
    #[serde(rename = "strict")]
    Strict,
    /// Cache failures are logged and the read is served by the record store
    #[serde(rename = "bypass")]
    BypassOnCacheError,
}

/// One step of a write's invalidation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Delete exactly this key
    Key(CacheKey),
    /// Delete every key the pattern matches
    Pattern(CacheKey),
}

/// Typed cache facade shared by all cached repositories
pub struct BaseCache {
    backend: Arc<dyn CacheBackend>,
    scope: String,
    default_ttl: Option<Duration>,
    read_policy: ReadPolicy,
}

impl std::fmt::Debug for BaseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseCache")
            .field("backend", &self.backend.backend_name())
            .field("scope", &self.scope)
            .field("default_ttl", &self.default_ttl)
            .field("read_policy", &self.read_policy)
            .finish()
    }
}

#[derive(Default)]
pub struct BaseCacheBuilder {
    backend: Option<Arc<dyn CacheBackend>>,
    scope: Option<String>,
    default_ttl: Option<Duration>,
    read_policy: ReadPolicy,
}

impl BaseCacheBuilder {
    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Scope recorded on every cache span
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// TTL applied to every `set`; `None` keeps entries until evicted
    pub fn default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn build(self) -> Result<BaseCache, ConfigError> {
        let backend = self.backend.ok_or(ConfigError::NoClient)?;
        let scope = self
            .scope
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::NoTracer)?;
        Ok(BaseCache {
            backend,
            scope,
            default_ttl: self.default_ttl,
            read_policy: self.read_policy,
        })
    }
}

impl BaseCache {
    pub fn builder() -> BaseCacheBuilder {
        BaseCacheBuilder::default()
    }

    /// Connect the configured backend and wrap it
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendType::Memory => {
                tracing::debug!(
                    max_entries = config.max_entries,
                    eviction_policy = %config.eviction_policy,
                    "Initializing in-memory cache"
                );
                Arc::new(InMemoryCache::new(
                    config.max_entries,
                    config.eviction_policy,
                ))
            }
            CacheBackendType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    CacheError::Config("redis_url required for Redis backend".into())
                })?;
                Arc::new(RedisCache::new(url).await?)
            }
        };

        let default_ttl = match config.default_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self::builder()
            .backend(backend)
            .scope(config.tracer_scope.clone())
            .default_ttl(default_ttl)
            .read_policy(config.read_policy)
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    /// Fetch and decode a cached value; a miss is `Ok(None)`
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<T>, RepositoryError> {
        let span = tracing::debug_span!("BaseCache/Get", scope = %self.scope, key = %key);
        async move {
            let Some(bytes) = self
                .backend
                .get(key.as_str())
                .await
                .map_err(RepositoryError::CacheRead)?
            else {
                return Ok(None);
            };
            let value = rmp_serde::from_slice(&bytes)
                .map_err(|e| RepositoryError::CacheRead(CacheError::decode(key.as_str(), e)))?;
            Ok(Some(value))
        }
        .instrument(span)
        .await
    }

    /// Encode and store a value with the default TTL
    pub async fn set<T: Serialize + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
    ) -> Result<(), RepositoryError> {
        let span = tracing::debug_span!("BaseCache/Set", scope = %self.scope, key = %key);
        async move {
            let bytes = rmp_serde::to_vec(value)
                .map_err(|e| RepositoryError::CacheWrite(CacheError::Encode(e.to_string())))?;
            self.backend
                .set(key.as_str(), bytes, self.default_ttl)
                .await
                .map_err(RepositoryError::CacheWrite)
        }
        .instrument(span)
        .await
    }

    /// Remove exactly one key; removing an absent key succeeds
    pub async fn delete(&self, key: &CacheKey) -> Result<(), RepositoryError> {
        let span = tracing::debug_span!("BaseCache/Delete", scope = %self.scope, key = %key);
        async move {
            self.backend
                .delete(key.as_str())
                .await
                .map(|_| ())
                .map_err(RepositoryError::CacheDelete)
        }
        .instrument(span)
        .await
    }

    /// Snapshot the keys matching `pattern`, then delete them one by one
    ///
    /// The first failure stops the walk; keys already removed stay removed.
    pub async fn delete_pattern(&self, pattern: &CacheKey) -> Result<u64, RepositoryError> {
        let span =
            tracing::debug_span!("BaseCache/DeletePattern", scope = %self.scope, key = %pattern);
        async move {
            let keys = self
                .backend
                .scan(pattern)
                .await
                .map_err(RepositoryError::CacheDelete)?;

            let mut deleted = 0u64;
            for key in keys {
                self.delete(&CacheKey::raw(key)).await?;
                deleted += 1;
            }
            tracing::trace!(deleted, "Pattern invalidated");
            Ok(deleted)
        }
        .instrument(span)
        .await
    }

    /// Run invalidation steps in order, stopping at the first failure
    pub async fn invalidate(&self, steps: &[Invalidation]) -> Result<(), RepositoryError> {
        for step in steps {
            match step {
                Invalidation::Key(key) => self.delete(key).await?,
                Invalidation::Pattern(pattern) => {
                    self.delete_pattern(pattern).await?;
                }
            }
        }
        Ok(())
    }

    /// Cache-aside read
    ///
    /// A hit is returned as is. On a miss `load` runs and its value is
    /// stored before being returned; errors from `load` (including
    /// `NotFound`) are returned without touching the cache.
    pub async fn read_through<T, F, Fut>(
        &self,
        key: &CacheKey,
        load: F,
    ) -> Result<T, RepositoryError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, RepositoryError>> + Send,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => {
                tracing::trace!(key = %key, "Cache hit");
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) if self.read_policy == ReadPolicy::BypassOnCacheError => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, reading record store");
                return load().await;
            }
            Err(e) => return Err(e),
        }

        let value = load().await?;
        match self.set(key, &value).await {
            Ok(()) => Ok(value),
            Err(e) if self.read_policy == ReadPolicy::BypassOnCacheError => {
                tracing::warn!(key = %key, error = %e, "Cache populate failed");
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.backend.health_check().await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{Call, RecordingCache, base_cache};
    use super::*;
    use crate::cache_key;
    use crate::data::error::ErrorKind;
    use crate::data::types::{Id, ResourceType};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        tags: Vec<String>,
    }

    fn item() -> Item {
        Item {
            id: "i1".into(),
            tags: vec!["a".into()],
        }
    }

    #[test]
    fn test_builder_requires_backend_and_scope() {
        assert_eq!(
            BaseCache::builder().scope("x").build().unwrap_err(),
            ConfigError::NoClient
        );
        let backend = RecordingCache::new();
        assert_eq!(
            BaseCache::builder()
                .backend(backend.clone())
                .scope("  ")
                .build()
                .unwrap_err(),
            ConfigError::NoTracer
        );
        let cache = BaseCache::builder()
            .backend(backend)
            .scope("repositories")
            .build()
            .unwrap();
        assert_eq!(cache.scope(), "repositories");
        assert_eq!(cache.read_policy(), ReadPolicy::Strict);
    }

    #[tokio::test]
    async fn test_typed_get_set() {
        let cache = base_cache(RecordingCache::new(), ReadPolicy::Strict);
        let key = CacheKey::raw("Item:i1");

        assert_eq!(cache.get::<Item>(&key).await.unwrap(), None);
        cache.set(&key, &item()).await.unwrap();
        assert_eq!(cache.get::<Item>(&key).await.unwrap(), Some(item()));
    }

    #[tokio::test]
    async fn test_decode_failure_is_cache_read() {
        let backend = RecordingCache::new();
        let cache = base_cache(backend.clone(), ReadPolicy::Strict);
        backend
            .set("Item:i1", vec![0xc1], None)
            .await
            .unwrap();

        let err = cache
            .get::<Item>(&CacheKey::raw("Item:i1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheRead);
    }

    #[tokio::test]
    async fn test_delete_pattern_deletes_snapshot() {
        let backend = RecordingCache::new();
        let cache = base_cache(backend.clone(), ReadPolicy::Strict);
        let user = Id::new(ResourceType::User, "u1");
        cache
            .set(&cache_key!(ResourceType::Assignment, "GetByUser", &user, 0i64, 10i64), &1u8)
            .await
            .unwrap();
        cache
            .set(&CacheKey::raw("Assignment:a1"), &2u8)
            .await
            .unwrap();
        backend.clear_calls();

        let pattern = cache_key!(ResourceType::Assignment, "GetByUser", &user, Wildcard);
        let deleted = cache.delete_pattern(&pattern).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(
            backend.calls(),
            vec![
                Call::Scan("Assignment:GetByUser:u1:*".into()),
                Call::Delete("Assignment:GetByUser:u1:0:10".into()),
            ]
        );
        assert!(backend.exists("Assignment:a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_pattern_is_noop() {
        let backend = RecordingCache::new();
        let cache = base_cache(backend.clone(), ReadPolicy::Strict);
        let deleted = cache.delete_pattern(&CacheKey::raw("Issue:*")).await.unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(backend.calls(), vec![Call::Scan("Issue:*".into())]);
    }

    #[tokio::test]
    async fn test_scan_failure_is_cache_delete() {
        let backend = RecordingCache::new();
        backend.fail_scan.store(true, Ordering::SeqCst);
        let cache = base_cache(backend, ReadPolicy::Strict);
        let err = cache
            .delete_pattern(&CacheKey::raw("Issue:*"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheDelete);
    }

    #[tokio::test]
    async fn test_invalidate_stops_at_first_failure() {
        let backend = RecordingCache::new();
        backend.fail_delete_of("Comment:c1");
        let cache = base_cache(backend.clone(), ReadPolicy::Strict);

        let err = cache
            .invalidate(&[
                Invalidation::Key(CacheKey::raw("Comment:c1")),
                Invalidation::Pattern(CacheKey::raw("Comment:GetAllBelongsTo:*")),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CacheDelete);
        assert_eq!(backend.calls(), vec![Call::Delete("Comment:c1".into())]);
    }

    #[tokio::test]
    async fn test_read_through_populates_on_miss() {
        let backend = RecordingCache::new();
        let cache = base_cache(backend.clone(), ReadPolicy::Strict);
        let key = CacheKey::raw("Item:i1");

        let first: Item = cache.read_through(&key, || async { Ok(item()) }).await.unwrap();
        let second: Item = cache
            .read_through(&key, || async { Err(RepositoryError::NotFound) })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.sets(), vec!["Item:i1".to_string()]);
        assert_eq!(backend.gets(), vec!["Item:i1".to_string(), "Item:i1".to_string()]);
    }

    #[tokio::test]
    async fn test_read_through_strict_surfaces_cache_errors() {
        let backend = RecordingCache::new();
        backend.fail_get.store(true, Ordering::SeqCst);
        let cache = base_cache(backend, ReadPolicy::Strict);

        let err = cache
            .read_through(&CacheKey::raw("Item:i1"), || async { Ok(item()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheRead);
    }

    #[tokio::test]
    async fn test_read_through_bypass_serves_record_store() {
        let backend = RecordingCache::new();
        backend.fail_get.store(true, Ordering::SeqCst);
        backend.fail_set.store(true, Ordering::SeqCst);
        let cache = base_cache(backend.clone(), ReadPolicy::BypassOnCacheError);

        let value = cache
            .read_through(&CacheKey::raw("Item:i1"), || async { Ok(item()) })
            .await
            .unwrap();
        assert_eq!(value, item());

        backend.fail_get.store(false, Ordering::SeqCst);
        let value = cache
            .read_through(&CacheKey::raw("Item:i2"), || async { Ok(item()) })
            .await
            .unwrap();
        assert_eq!(value, item());
    }

    #[test]
    fn test_read_policy_serde_names() {
        assert_eq!(
            serde_json::from_str::<ReadPolicy>("\"bypass\"").unwrap(),
            ReadPolicy::BypassOnCacheError
        );
        assert_eq!(
            serde_json::to_string(&ReadPolicy::Strict).unwrap(),
            "\"strict\""
        );
    }

    mod spans {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        use tracing::span;
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::Context;
        use tracing_subscriber::registry::LookupSpan;

        /// Counts span lifecycle callbacks by span name
        #[derive(Clone, Default)]
        pub struct SpanLog {
            names: Arc<Mutex<HashMap<u64, &'static str>>>,
            counts: Arc<Mutex<HashMap<(&'static str, &'static str), usize>>>,
        }

        impl SpanLog {
            fn bump(&self, id: &span::Id, event: &'static str) {
                let name = self.names.lock().unwrap().get(&id.into_u64()).copied();
                if let Some(name) = name {
                    *self.counts.lock().unwrap().entry((name, event)).or_default() += 1;
                }
            }

            pub fn count(&self, name: &'static str, event: &'static str) -> usize {
                self.counts
                    .lock()
                    .unwrap()
                    .get(&(name, event))
                    .copied()
                    .unwrap_or(0)
            }

            /// Every span with this name was entered and has since closed
            pub fn assert_balanced(&self, name: &'static str) {
                let opened = self.count(name, "new");
                assert!(opened > 0, "{name} never opened");
                assert!(self.count(name, "enter") >= opened, "{name} not entered");
                assert_eq!(self.count(name, "close"), opened, "{name} left open");
            }
        }

        impl<S> Layer<S> for SpanLog
        where
            S: tracing::Subscriber + for<'a> LookupSpan<'a>,
        {
            fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _: Context<'_, S>) {
                self.names
                    .lock()
                    .unwrap()
                    .insert(id.into_u64(), attrs.metadata().name());
                self.bump(id, "new");
            }

            fn on_enter(&self, id: &span::Id, _: Context<'_, S>) {
                self.bump(id, "enter");
            }

            fn on_close(&self, id: span::Id, _: Context<'_, S>) {
                self.bump(&id, "close");
            }
        }
    }

    fn capture_spans() -> (spans::SpanLog, tracing::subscriber::DefaultGuard) {
        use tracing_subscriber::layer::SubscriberExt;

        let log = spans::SpanLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        (log, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test]
    async fn test_spans_close_on_success() {
        let (log, _guard) = capture_spans();
        let cache = base_cache(RecordingCache::new(), ReadPolicy::Strict);
        let key = CacheKey::raw("Item:i1");

        cache.set(&key, &item()).await.unwrap();
        cache.get::<Item>(&key).await.unwrap();
        cache.delete(&key).await.unwrap();
        cache.set(&key, &item()).await.unwrap();
        cache.delete_pattern(&CacheKey::raw("Item:*")).await.unwrap();

        for name in [
            "BaseCache/Get",
            "BaseCache/Set",
            "BaseCache/Delete",
            "BaseCache/DeletePattern",
        ] {
            log.assert_balanced(name);
        }
        // the matched key is removed inside the pattern span
        assert_eq!(log.count("BaseCache/Delete", "new"), 2);
    }

    #[tokio::test]
    async fn test_spans_close_on_failure() {
        let (log, _guard) = capture_spans();
        let backend = RecordingCache::new();
        let cache = base_cache(backend.clone(), ReadPolicy::Strict);
        let key = CacheKey::raw("Item:i1");
        cache.set(&key, &item()).await.unwrap();

        backend.fail_get.store(true, Ordering::SeqCst);
        backend.fail_set.store(true, Ordering::SeqCst);
        backend.fail_scan.store(true, Ordering::SeqCst);
        backend.fail_delete_of("Item:i1");

        assert!(cache.get::<Item>(&key).await.is_err());
        assert!(cache.set(&key, &item()).await.is_err());
        assert!(cache.delete(&key).await.is_err());
        assert!(cache.delete_pattern(&CacheKey::raw("Item:*")).await.is_err());

        for name in [
            "BaseCache/Get",
            "BaseCache/Set",
            "BaseCache/Delete",
            "BaseCache/DeletePattern",
        ] {
            log.assert_balanced(name);
        }
    }
}
