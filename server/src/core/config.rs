use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::cache::ReadPolicy;
use crate::data::types::ResourceType;
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_CACHED_RESOURCE_TYPES, DEFAULT_TRACER_SCOPE, FILES_DEFAULT_DIR,
    FILES_DEFAULT_S3_PREFIX, POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS, POSTGRES_DEFAULT_MAX_CONNECTIONS,
    POSTGRES_DEFAULT_MAX_LIFETIME_SECS, POSTGRES_DEFAULT_MIN_CONNECTIONS,
    POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS, SQLITE_DB_FILENAME,
};

// =============================================================================
// Storage Backend Enum
// =============================================================================

/// Storage backend type for static files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Filesystem => write!(f, "filesystem"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

// =============================================================================
// Database Backend Enum (SQLite or PostgreSQL)
// =============================================================================

/// Record store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// SQLite (default, embedded)
    #[default]
    Sqlite,
    /// PostgreSQL (for multi-instance deployments)
    Postgres,
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackend::Sqlite => write!(f, "sqlite"),
            DatabaseBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// Cache Backend Enum
// =============================================================================

/// Cache backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

// =============================================================================
// Eviction Policy Enum
// =============================================================================

/// Cache eviction policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// TinyLFU - LRU eviction + LFU admission (near-optimal hit ratio)
    #[default]
    TinyLfu,
    /// Simple LRU (better for recency-biased workloads)
    Lru,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::TinyLfu => write!(f, "tinylfu"),
            EvictionPolicy::Lru => write!(f, "lru"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON)
// =============================================================================

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SqliteFileConfig {
    pub path: Option<String>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use TRELLIS_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// sqlite (default) or postgres
    pub backend: Option<DatabaseBackend>,
    pub sqlite: Option<SqliteFileConfig>,
    pub postgres: Option<PostgresFileConfig>,
}

/// Redis cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedisFileConfig {
    /// Connection URL for Redis-compatible backends
    pub url: Option<String>,
}

/// Memory cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemoryCacheFileConfig {
    pub max_entries: Option<u64>,
    pub eviction_policy: Option<EvictionPolicy>,
}

/// Cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    /// memory (default) or redis
    pub backend: Option<CacheBackendType>,
    pub redis: Option<RedisFileConfig>,
    pub memory: Option<MemoryCacheFileConfig>,
    /// TTL applied to cached entries, 0 for no expiry
    pub default_ttl_secs: Option<u64>,
    pub read_policy: Option<ReadPolicy>,
    /// Resource type names whose cached reads embed assignments
    pub cached_resource_types: Option<Vec<String>>,
    pub tracer_scope: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilesFilesystemFileConfig {
    pub path: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilesS3FileConfig {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// File storage configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilesFileConfig {
    pub storage: Option<StorageBackend>,
    pub filesystem: Option<FilesFilesystemFileConfig>,
    pub s3: Option<FilesS3FileConfig>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub files: Option<FilesFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Overwrite `current` with `other` when it is set
fn merge_field<T: fmt::Debug>(current: &mut Option<T>, other: Option<T>, name: &str) {
    if other.is_some() {
        tracing::trace!(value = ?other, "Merging {}", name);
        *current = other;
    }
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Database
        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            merge_field(&mut current.backend, database.backend, "database.backend");
            if let Some(sqlite) = database.sqlite {
                let current_sqlite = current.sqlite.get_or_insert_with(SqliteFileConfig::default);
                merge_field(&mut current_sqlite.path, sqlite.path, "database.sqlite.path");
            }
            if let Some(pg) = database.postgres {
                let c = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                merge_field(&mut c.url, pg.url, "database.postgres.url");
                merge_field(
                    &mut c.max_connections,
                    pg.max_connections,
                    "database.postgres.max_connections",
                );
                merge_field(
                    &mut c.min_connections,
                    pg.min_connections,
                    "database.postgres.min_connections",
                );
                merge_field(
                    &mut c.acquire_timeout_secs,
                    pg.acquire_timeout_secs,
                    "database.postgres.acquire_timeout_secs",
                );
                merge_field(
                    &mut c.idle_timeout_secs,
                    pg.idle_timeout_secs,
                    "database.postgres.idle_timeout_secs",
                );
                merge_field(
                    &mut c.max_lifetime_secs,
                    pg.max_lifetime_secs,
                    "database.postgres.max_lifetime_secs",
                );
                merge_field(
                    &mut c.statement_timeout_secs,
                    pg.statement_timeout_secs,
                    "database.postgres.statement_timeout_secs",
                );
            }
        }

        // Cache
        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            merge_field(&mut current.backend, cache.backend, "cache.backend");
            if let Some(redis) = cache.redis {
                let current_redis = current.redis.get_or_insert_with(RedisFileConfig::default);
                merge_field(&mut current_redis.url, redis.url, "cache.redis.url");
            }
            if let Some(memory) = cache.memory {
                let current_memory = current
                    .memory
                    .get_or_insert_with(MemoryCacheFileConfig::default);
                merge_field(
                    &mut current_memory.max_entries,
                    memory.max_entries,
                    "cache.memory.max_entries",
                );
                merge_field(
                    &mut current_memory.eviction_policy,
                    memory.eviction_policy,
                    "cache.memory.eviction_policy",
                );
            }
            merge_field(
                &mut current.default_ttl_secs,
                cache.default_ttl_secs,
                "cache.default_ttl_secs",
            );
            merge_field(&mut current.read_policy, cache.read_policy, "cache.read_policy");
            merge_field(
                &mut current.cached_resource_types,
                cache.cached_resource_types,
                "cache.cached_resource_types",
            );
            merge_field(&mut current.tracer_scope, cache.tracer_scope, "cache.tracer_scope");
        }

        // Files
        if let Some(files) = other.files {
            let current = self.files.get_or_insert_with(FilesFileConfig::default);
            merge_field(&mut current.storage, files.storage, "files.storage");
            if let Some(filesystem) = files.filesystem {
                let current_fs = current
                    .filesystem
                    .get_or_insert_with(FilesFilesystemFileConfig::default);
                merge_field(&mut current_fs.path, filesystem.path, "files.filesystem.path");
            }
            if let Some(s3) = files.s3 {
                let current_s3 = current.s3.get_or_insert_with(FilesS3FileConfig::default);
                merge_field(&mut current_s3.bucket, s3.bucket, "files.s3.bucket");
                merge_field(&mut current_s3.prefix, s3.prefix, "files.s3.prefix");
                merge_field(&mut current_s3.region, s3.region, "files.s3.region");
                merge_field(&mut current_s3.endpoint, s3.endpoint, "files.s3.endpoint");
            }
        }

        if !other.extra.is_null() {
            self.extra = other.extra;
        }
    }
}

// =============================================================================
// Runtime Config Structs
// =============================================================================

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone, Default)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// Record store configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub sqlite_path: PathBuf,
    /// Only used if backend = postgres
    pub postgres: Option<PostgresConfig>,
}

/// Cache configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    /// Maximum entries (memory backend)
    pub max_entries: u64,
    /// Eviction policy (memory backend)
    pub eviction_policy: EvictionPolicy,
    /// Redis URL (redis backend)
    pub redis_url: Option<String>,
    /// 0 keeps entries until evicted
    pub default_ttl_secs: u64,
    pub read_policy: ReadPolicy,
    /// Resource types whose cached reads are flushed on assignment create
    pub cached_resource_types: Vec<ResourceType>,
    /// Scope recorded on every cache span
    pub tracer_scope: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendType::default(),
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            eviction_policy: EvictionPolicy::default(),
            redis_url: None,
            default_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            read_policy: ReadPolicy::default(),
            cached_resource_types: vec![ResourceType::Issue],
            tracer_scope: DEFAULT_TRACER_SCOPE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Static file storage configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct FilesConfig {
    pub storage: StorageBackend,
    pub filesystem_path: PathBuf,
    pub s3: Option<S3Config>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub files: FilesConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.trellis/trellis.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.trellis/trellis.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(file_config, cli)?;
        config.validate()?;

        tracing::debug!(
            database = %config.database.backend,
            cache = %config.cache.backend,
            files = %config.files.storage,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer defaults, merged file config and CLI/env overrides
    fn from_layers(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_database = file_config.database.unwrap_or_default();
        let file_sqlite = file_database.sqlite.unwrap_or_default();
        let file_postgres = file_database.postgres.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_redis = file_cache.redis.unwrap_or_default();
        let file_memory = file_cache.memory.unwrap_or_default();
        let file_files = file_config.files.unwrap_or_default();
        let file_fs = file_files.filesystem.unwrap_or_default();

        // Database
        let backend = cli
            .database_backend
            .or(file_database.backend)
            .unwrap_or_default();

        let sqlite_path = cli
            .sqlite_path
            .clone()
            .or(file_sqlite.path)
            .map(|p| expand_path(&p))
            .unwrap_or_else(|| profile_dir().join(SQLITE_DB_FILENAME));

        let postgres = match backend {
            DatabaseBackend::Postgres => Some(PostgresConfig {
                url: cli
                    .postgres_url
                    .clone()
                    .or(file_postgres.url)
                    .unwrap_or_default(),
                max_connections: file_postgres
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_postgres
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_postgres
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_postgres
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_postgres
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_postgres
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            }),
            DatabaseBackend::Sqlite => None,
        };

        // Cache
        let type_names: Vec<String> = match cli.cache_resource_types.clone() {
            Some(names) => names,
            None => file_cache.cached_resource_types.unwrap_or_else(|| {
                DEFAULT_CACHED_RESOURCE_TYPES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
        };
        let cached_resource_types = parse_resource_types(&type_names)?;

        let cache = CacheConfig {
            backend: cli.cache_backend.or(file_cache.backend).unwrap_or_default(),
            max_entries: cli
                .cache_max_entries
                .or(file_memory.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            eviction_policy: cli
                .cache_eviction_policy
                .or(file_memory.eviction_policy)
                .unwrap_or_default(),
            redis_url: cli.cache_redis_url.clone().or(file_redis.url),
            default_ttl_secs: cli
                .cache_ttl_secs
                .or(file_cache.default_ttl_secs)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            read_policy: cli
                .cache_read_policy
                .or(file_cache.read_policy)
                .unwrap_or_default(),
            cached_resource_types,
            tracer_scope: file_cache
                .tracer_scope
                .unwrap_or_else(|| DEFAULT_TRACER_SCOPE.to_string()),
        };

        // Files
        let storage = cli.files_storage.or(file_files.storage).unwrap_or_default();
        let filesystem_path = cli
            .files_path
            .clone()
            .or(file_fs.path)
            .map(|p| expand_path(&p))
            .unwrap_or_else(|| profile_dir().join(FILES_DEFAULT_DIR));

        // Empty bucket counts as missing
        let s3 = file_files.s3.and_then(|s3| {
            let bucket = cli
                .files_s3_bucket
                .clone()
                .or(s3.bucket)
                .filter(|b| !b.trim().is_empty())?;
            Some(S3Config {
                bucket,
                prefix: s3
                    .prefix
                    .unwrap_or_else(|| FILES_DEFAULT_S3_PREFIX.to_string()),
                region: s3.region,
                endpoint: s3.endpoint,
            })
        });
        let s3 = s3.or_else(|| {
            cli.files_s3_bucket
                .clone()
                .filter(|b| !b.trim().is_empty())
                .map(|bucket| S3Config {
                    bucket,
                    prefix: FILES_DEFAULT_S3_PREFIX.to_string(),
                    region: None,
                    endpoint: None,
                })
        });

        Ok(Self {
            database: DatabaseConfig {
                backend,
                sqlite_path,
                postgres,
            },
            cache,
            files: FilesConfig {
                storage,
                filesystem_path,
                s3,
            },
        })
    }

    fn validate(&self) -> Result<()> {
        // PostgreSQL URL required when using the postgres backend
        if self.database.backend == DatabaseBackend::Postgres
            && self
                .database
                .postgres
                .as_ref()
                .is_none_or(|p| p.url.trim().is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when database.backend is 'postgres'"
            );
        }

        // Redis URL required when using Redis cache backend
        if self.cache.backend == CacheBackendType::Redis
            && self
                .cache
                .redis_url
                .as_ref()
                .is_none_or(|u| u.trim().is_empty())
        {
            anyhow::bail!(
                "Configuration error: cache.redis.url is required when cache.backend is 'redis'"
            );
        }

        // S3 bucket required when using S3 storage
        if self.files.storage == StorageBackend::S3 && self.files.s3.is_none() {
            anyhow::bail!(
                "Configuration error: files.s3.bucket is required (and non-empty) when files.storage is 's3'"
            );
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("Configuration error: cache.memory.max_entries must be greater than 0");
        }

        if self.cache.tracer_scope.trim().is_empty() {
            anyhow::bail!("Configuration error: cache.tracer_scope must not be empty");
        }

        if self.cache.cached_resource_types.is_empty() {
            anyhow::bail!(
                "Configuration error: cache.cached_resource_types must list at least one type"
            );
        }

        Ok(())
    }
}

/// Parse configured resource type names, rejecting unknown ones
fn parse_resource_types(names: &[String]) -> Result<Vec<ResourceType>> {
    names
        .iter()
        .map(|name| {
            name.trim().parse::<ResourceType>().with_context(|| {
                format!("Configuration error: cache.cached_resource_types has unknown type '{name}'")
            })
        })
        .collect()
}

/// Profile folder (~/.trellis), falling back to the working directory
fn profile_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(APP_DOT_FOLDER))
        .unwrap_or_else(|| PathBuf::from(APP_DOT_FOLDER))
}

/// Get the profile config path (~/.trellis/trellis.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered(json: &str, cli: &CliConfig) -> Result<AppConfig> {
        let file_config: FileConfig = serde_json::from_str(json).unwrap();
        let config = AppConfig::from_layers(file_config, cli)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_storage_backend_serde() {
        let backend: StorageBackend = serde_json::from_str(r#""s3""#).unwrap();
        assert_eq!(backend, StorageBackend::S3);
        assert_eq!(StorageBackend::Filesystem.to_string(), "filesystem");
    }

    #[test]
    fn test_read_policy_serde() {
        let policy: ReadPolicy = serde_json::from_str(r#""bypass""#).unwrap();
        assert_eq!(policy, ReadPolicy::BypassOnCacheError);
    }

    #[test]
    fn test_defaults() {
        let config = layered("{}", &CliConfig::default()).unwrap();

        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert!(config.database.sqlite_path.ends_with(SQLITE_DB_FILENAME));
        assert!(config.database.postgres.is_none());
        assert_eq!(config.cache.backend, CacheBackendType::Memory);
        assert_eq!(config.cache.max_entries, DEFAULT_CACHE_MAX_ENTRIES);
        assert_eq!(config.cache.read_policy, ReadPolicy::Strict);
        assert_eq!(config.cache.cached_resource_types, vec![ResourceType::Issue]);
        assert_eq!(config.cache.tracer_scope, DEFAULT_TRACER_SCOPE);
        assert_eq!(config.files.storage, StorageBackend::Filesystem);
        assert!(config.files.filesystem_path.ends_with(FILES_DEFAULT_DIR));
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "database": {
                "backend": "postgres",
                "postgres": { "url": "postgres://localhost/trellis", "max_connections": 50 }
            },
            "cache": {
                "backend": "redis",
                "redis": { "url": "redis://localhost:6379" },
                "default_ttl_secs": 0,
                "read_policy": "bypass",
                "cached_resource_types": ["Issue", "document"],
                "tracer_scope": "svc/repos"
            },
            "files": { "storage": "s3", "s3": { "bucket": "blobs", "region": "eu-west-1" } }
        }"#;
        let config = layered(json, &CliConfig::default()).unwrap();

        let pg = config.database.postgres.unwrap();
        assert_eq!(pg.url, "postgres://localhost/trellis");
        assert_eq!(pg.max_connections, 50);
        assert_eq!(pg.min_connections, POSTGRES_DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.cache.default_ttl_secs, 0);
        assert_eq!(config.cache.read_policy, ReadPolicy::BypassOnCacheError);
        assert_eq!(
            config.cache.cached_resource_types,
            vec![ResourceType::Issue, ResourceType::Document]
        );
        let s3 = config.files.s3.unwrap();
        assert_eq!(s3.bucket, "blobs");
        assert_eq!(s3.prefix, FILES_DEFAULT_S3_PREFIX);
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "cache": { "backend": "memory" }, "cahce": {} }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        let serde_json::Value::Object(extra) = &config.extra else {
            panic!("expected extra fields");
        };
        assert!(extra.contains_key("cahce"));
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "cache": { "memory": { "max_entries": 10, "eviction_policy": "lru" } } }"#,
        )
        .unwrap();
        let overlay: FileConfig =
            serde_json::from_str(r#"{ "cache": { "memory": { "max_entries": 20 } } }"#).unwrap();

        base.merge(overlay);
        let memory = base.cache.unwrap().memory.unwrap();
        assert_eq!(memory.max_entries, Some(20));
        assert_eq!(memory.eviction_policy, Some(EvictionPolicy::Lru));
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = CliConfig {
            cache_max_entries: Some(5),
            cache_read_policy: Some(ReadPolicy::BypassOnCacheError),
            cache_resource_types: Some(vec!["Project".to_string()]),
            ..Default::default()
        };
        let json = r#"{ "cache": { "memory": { "max_entries": 10 }, "read_policy": "strict" } }"#;
        let config = layered(json, &cli).unwrap();

        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.cache.read_policy, ReadPolicy::BypassOnCacheError);
        assert_eq!(config.cache.cached_resource_types, vec![ResourceType::Project]);
    }

    #[test]
    fn test_validation_postgres_url_required() {
        let json = r#"{ "database": { "backend": "postgres" } }"#;
        let err = layered(json, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("database.postgres.url is required"));
    }

    #[test]
    fn test_validation_redis_url_required() {
        let cli = CliConfig {
            cache_backend: Some(CacheBackendType::Redis),
            ..Default::default()
        };
        let err = layered("{}", &cli).unwrap_err();
        assert!(err.to_string().contains("cache.redis.url is required"));
    }

    #[test]
    fn test_validation_s3_bucket_required() {
        let json = r#"{ "files": { "storage": "s3", "s3": { "bucket": "  " } } }"#;
        let err = layered(json, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("files.s3.bucket is required"));
    }

    #[test]
    fn test_validation_zero_max_entries() {
        let cli = CliConfig {
            cache_max_entries: Some(0),
            ..Default::default()
        };
        assert!(layered("{}", &cli).is_err());
    }

    #[test]
    fn test_validation_empty_tracer_scope() {
        let json = r#"{ "cache": { "tracer_scope": " " } }"#;
        let err = layered(json, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("tracer_scope"));
    }

    #[test]
    fn test_unknown_resource_type_rejected() {
        let json = r#"{ "cache": { "cached_resource_types": ["Issue", "Widget"] } }"#;
        let err = layered(json, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Widget"));
    }

    #[test]
    fn test_empty_resource_types_rejected() {
        let json = r#"{ "cache": { "cached_resource_types": [] } }"#;
        let err = layered(json, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("cached_resource_types"));

        let cli = CliConfig {
            cache_resource_types: Some(vec![]),
            ..Default::default()
        };
        assert!(layered("{}", &cli).is_err());
    }

    #[test]
    fn test_load_missing_config_path() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/trellis.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_from_config_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        let db = dir.path().join("db.sqlite");
        std::fs::write(
            &path,
            format!(
                r#"{{ "database": {{ "sqlite": {{ "path": "{}" }} }} }}"#,
                db.display()
            ),
        )
        .unwrap();

        let cli = CliConfig {
            config: Some(path),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.database.sqlite_path, db);
    }
}
