// =============================================================================
// Application Identity
// =============================================================================

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".trellis";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "trellis.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "TRELLIS_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "TRELLIS_LOG";

/// Filter used when neither TRELLIS_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,trellis=info,trellis_server=info";

// =============================================================================
// Database
// =============================================================================

/// Environment variable for record store backend (sqlite | postgres)
pub const ENV_DATABASE_BACKEND: &str = "TRELLIS_DATABASE_BACKEND";

/// Environment variable for the SQLite database path
pub const ENV_SQLITE_PATH: &str = "TRELLIS_SQLITE_PATH";

/// Environment variable for the PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "TRELLIS_POSTGRES_URL";

/// SQLite database filename inside the profile folder
pub const SQLITE_DB_FILENAME: &str = "trellis.db";

/// SQLite max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// PostgreSQL default max connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL default min connections (keep warm for low latency)
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// PostgreSQL default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL idle connection timeout in seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// PostgreSQL max connection lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// PostgreSQL statement timeout in seconds (0 = disabled)
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Cache
// =============================================================================

/// Environment variable for cache backend (memory | redis)
pub const ENV_CACHE_BACKEND: &str = "TRELLIS_CACHE_BACKEND";

/// Environment variable for cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "TRELLIS_CACHE_MAX_ENTRIES";

/// Environment variable for cache eviction policy (tinylfu | lru)
pub const ENV_CACHE_EVICTION_POLICY: &str = "TRELLIS_CACHE_EVICTION_POLICY";

/// Environment variable for the comma-separated cached resource types
pub const ENV_CACHE_RESOURCE_TYPES: &str = "TRELLIS_CACHE_RESOURCE_TYPES";

/// Environment variable for Redis-compatible cache URL
pub const ENV_CACHE_REDIS_URL: &str = "TRELLIS_CACHE_REDIS_URL";

/// Environment variable for the default cache TTL in seconds
pub const ENV_CACHE_TTL_SECS: &str = "TRELLIS_CACHE_TTL_SECS";

/// Environment variable for the cache read policy (strict | bypass)
pub const ENV_CACHE_READ_POLICY: &str = "TRELLIS_CACHE_READ_POLICY";

/// Default cache max entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Default cache TTL (10 min, 0 = no expiry)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Default scope recorded on cache spans
pub const DEFAULT_TRACER_SCOPE: &str = "trellis/repositories";

/// Resource types whose cached reads are flushed when an assignment is created
pub const DEFAULT_CACHED_RESOURCE_TYPES: &[&str] = &["Issue"];

// =============================================================================
// File Storage
// =============================================================================

/// Environment variable for file storage backend (filesystem | s3)
pub const ENV_FILES_STORAGE: &str = "TRELLIS_FILES_STORAGE";

/// Environment variable for the filesystem storage directory
pub const ENV_FILES_PATH: &str = "TRELLIS_FILES_PATH";

/// Environment variable for the S3 bucket
pub const ENV_FILES_S3_BUCKET: &str = "TRELLIS_FILES_S3_BUCKET";

/// Default directory name for filesystem storage inside the profile folder
pub const FILES_DEFAULT_DIR: &str = "files";

/// Default S3 key prefix
pub const FILES_DEFAULT_S3_PREFIX: &str = "trellis/files";
