use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::{CacheBackendType, DatabaseBackend, EvictionPolicy, StorageBackend};
use super::constants::{
    ENV_CACHE_BACKEND, ENV_CACHE_EVICTION_POLICY, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_READ_POLICY,
    ENV_CACHE_REDIS_URL, ENV_CACHE_RESOURCE_TYPES, ENV_CACHE_TTL_SECS, ENV_CONFIG,
    ENV_DATABASE_BACKEND, ENV_FILES_PATH, ENV_FILES_S3_BUCKET, ENV_FILES_STORAGE,
    ENV_POSTGRES_URL, ENV_SQLITE_PATH,
};
use crate::data::cache::{CacheKey, KeyPart, ReadPolicy, WILDCARD, Wildcard};
use crate::data::types::ResourceType;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about = "Cache-aside data layer tooling", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    // Database options
    /// Record store backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_DATABASE_BACKEND, value_parser = parse_database_backend)]
    pub database_backend: Option<DatabaseBackend>,

    /// SQLite database path
    #[arg(long, global = true, env = ENV_SQLITE_PATH)]
    pub sqlite_path: Option<String>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    // Cache options
    /// Cache backend (memory or redis)
    #[arg(long, global = true, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Cache eviction policy (tinylfu or lru)
    #[arg(long, global = true, env = ENV_CACHE_EVICTION_POLICY, value_parser = parse_eviction_policy)]
    pub cache_eviction_policy: Option<EvictionPolicy>,

    /// Redis-compatible cache URL. Supports Redis, Sentinel, Valkey, Dragonfly.
    /// Formats: redis://host:port/db, redis+sentinel://s1:port,s2:port/master/db
    #[arg(long, global = true, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    /// Default cache TTL in seconds (0 = no expiry)
    #[arg(long, global = true, env = ENV_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,

    /// Cache read policy (strict or bypass)
    #[arg(long, global = true, env = ENV_CACHE_READ_POLICY, value_parser = parse_read_policy)]
    pub cache_read_policy: Option<ReadPolicy>,

    /// Resource types flushed when an assignment is created (comma separated)
    #[arg(long, global = true, env = ENV_CACHE_RESOURCE_TYPES, value_delimiter = ',')]
    pub cache_resource_types: Option<Vec<String>>,

    // File storage options
    /// File storage backend (filesystem or s3)
    #[arg(long, global = true, env = ENV_FILES_STORAGE, value_parser = parse_storage_backend)]
    pub files_storage: Option<StorageBackend>,

    /// Filesystem storage directory
    #[arg(long, global = true, env = ENV_FILES_PATH)]
    pub files_path: Option<String>,

    /// S3 bucket (when using s3 storage)
    #[arg(long, global = true, env = ENV_FILES_S3_BUCKET)]
    pub files_s3_bucket: Option<String>,
}

/// Parse storage backend from CLI/env string
fn parse_storage_backend(s: &str) -> Result<StorageBackend, String> {
    match s.to_lowercase().as_str() {
        "filesystem" => Ok(StorageBackend::Filesystem),
        "s3" => Ok(StorageBackend::S3),
        _ => Err(format!(
            "Invalid storage backend '{}'. Valid options: filesystem, s3",
            s
        )),
    }
}

/// Parse cache backend type from CLI/env string
fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        _ => Err(format!(
            "Invalid cache backend '{}'. Valid options: memory, redis",
            s
        )),
    }
}

/// Parse eviction policy from CLI/env string
fn parse_eviction_policy(s: &str) -> Result<EvictionPolicy, String> {
    match s.to_lowercase().as_str() {
        "tinylfu" => Ok(EvictionPolicy::TinyLfu),
        "lru" => Ok(EvictionPolicy::Lru),
        _ => Err(format!(
            "Invalid eviction policy '{}'. Valid options: tinylfu, lru",
            s
        )),
    }
}

/// Parse cache read policy from CLI/env string
fn parse_read_policy(s: &str) -> Result<ReadPolicy, String> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(ReadPolicy::Strict),
        "bypass" => Ok(ReadPolicy::BypassOnCacheError),
        _ => Err(format!(
            "Invalid read policy '{}'. Valid options: strict, bypass",
            s
        )),
    }
}

/// Parse record store backend from CLI/env string
fn parse_database_backend(s: &str) -> Result<DatabaseBackend, String> {
    match s.to_lowercase().as_str() {
        "sqlite" => Ok(DatabaseBackend::Sqlite),
        "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
        _ => Err(format!(
            "Invalid database backend '{}'. Valid options: sqlite, postgres",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Connect every configured backend and run its health check
    Check,
    /// Open the record store and apply pending migrations
    Migrate,
    /// Cache maintenance commands
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum CacheCommands {
    /// Delete every cached key matching a pattern, e.g. `Project:GetAll:*`
    Flush { pattern: String },
    /// Print the cache key composed from the given parts
    Key {
        #[arg(required = true)]
        parts: Vec<String>,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub database_backend: Option<DatabaseBackend>,
    pub sqlite_path: Option<String>,
    pub postgres_url: Option<String>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_max_entries: Option<u64>,
    pub cache_eviction_policy: Option<EvictionPolicy>,
    pub cache_redis_url: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_read_policy: Option<ReadPolicy>,
    pub cache_resource_types: Option<Vec<String>>,
    pub files_storage: Option<StorageBackend>,
    pub files_path: Option<String>,
    pub files_s3_bucket: Option<String>,
}

impl From<Cli> for (CliConfig, Commands) {
    fn from(cli: Cli) -> Self {
        let config = CliConfig {
            config: cli.config,
            database_backend: cli.database_backend,
            sqlite_path: cli.sqlite_path,
            postgres_url: cli.postgres_url,
            cache_backend: cli.cache_backend,
            cache_max_entries: cli.cache_max_entries,
            cache_eviction_policy: cli.cache_eviction_policy,
            cache_redis_url: cli.cache_redis_url,
            cache_ttl_secs: cli.cache_ttl_secs,
            cache_read_policy: cli.cache_read_policy,
            cache_resource_types: cli.cache_resource_types,
            files_storage: cli.files_storage,
            files_path: cli.files_path,
            files_s3_bucket: cli.files_s3_bucket,
        };
        (config, cli.command)
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    Cli::parse().into()
}

/// Compose a cache key from command-line parts
///
/// `*` becomes the wildcard, resource type names render as tags and
/// anything else is an escaped literal segment.
pub fn compose_key(parts: &[String]) -> CacheKey {
    let typed: Vec<Box<dyn KeyPart>> = parts
        .iter()
        .map(|part| -> Box<dyn KeyPart> {
            if part == WILDCARD {
                Box::new(Wildcard)
            } else if let Ok(kind) = part.parse::<ResourceType>() {
                Box::new(kind)
            } else {
                Box::new(part.clone())
            }
        })
        .collect();
    let refs: Vec<&dyn KeyPart> = typed.iter().map(|p| p.as_ref()).collect();
    CacheKey::compose(&refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compose_key_from_parts() {
        let key = compose_key(&parts(&["assignment", "GetByUser", "u1", "0", "10"]));
        assert_eq!(key.as_str(), "Assignment:GetByUser:u1:0:10");
    }

    #[test]
    fn test_compose_key_pattern() {
        let key = compose_key(&parts(&["Project", "GetAll", "*"]));
        assert!(key.is_pattern());
        assert_eq!(key.as_str(), "Project:GetAll:*");
    }

    #[test]
    fn test_compose_key_escapes_literals() {
        let key = compose_key(&parts(&["Project", "GetByKey", "a:b"]));
        assert_eq!(key.as_str(), "Project:GetByKey:a%3Ab");
    }

    #[test]
    fn test_parse_cache_flush_command() {
        let cli = Cli::try_parse_from(["trellis", "cache", "flush", "Issue:*"]).unwrap();
        let (config, command) = cli.into();
        assert!(config.config.is_none());
        assert!(matches!(
            command,
            Commands::Cache { command: CacheCommands::Flush { pattern } } if pattern == "Issue:*"
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "trellis",
            "check",
            "--cache-read-policy",
            "bypass",
            "--cache-resource-types",
            "Issue,Document",
            "--database-backend",
            "postgresql",
        ])
        .unwrap();
        let (config, command) = cli.into();
        assert!(matches!(command, Commands::Check));
        assert_eq!(config.cache_read_policy, Some(ReadPolicy::BypassOnCacheError));
        assert_eq!(
            config.cache_resource_types,
            Some(vec!["Issue".to_string(), "Document".to_string()])
        );
        assert_eq!(config.database_backend, Some(DatabaseBackend::Postgres));
    }

    #[test]
    fn test_invalid_backend_rejected() {
        assert!(parse_storage_backend("ftp").is_err());
        assert!(parse_eviction_policy("fifo").is_err());
        assert!(parse_cache_backend_type("memcached").is_err());
    }
}
