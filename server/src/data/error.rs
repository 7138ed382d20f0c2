//! Error types for the data layer
//!
//! [`DataError`] wraps record-store failures while keeping the backend that
//! produced them. [`RepositoryError`] is what every repository returns, cached
//! or not. [`ConfigError`] covers wiring failures at construction time.

use std::fmt;

use thiserror::Error;

use crate::data::cache::CacheError;
use crate::data::types::{IdError, ResourceType};

/// Unified error type for record-store operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be mapped back to an entity
    #[error("Failed to decode row from {backend}: {message}")]
    Decode {
        backend: &'static str,
        message: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DataError {
    pub fn from_sqlite(e: sqlx::Error) -> Self {
        Self::Sqlite(e)
    }

    pub fn from_postgres(e: sqlx::Error) -> Self {
        Self::Postgres(e)
    }

    pub fn migration_failed(backend: &'static str, version: i32, name: &str, error: &str) -> Self {
        Self::MigrationFailed {
            backend,
            version,
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    /// Connection-level failures that may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) | Self::Postgres(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            _ => false,
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
            Self::MigrationFailed { backend, .. } | Self::Decode { backend, .. } => backend,
            Self::Config(_) | Self::Io(_) | Self::Validation(_) => "unknown",
        }
    }
}

impl From<crate::data::sqlite::SqliteError> for DataError {
    fn from(e: crate::data::sqlite::SqliteError) -> Self {
        use crate::data::sqlite::SqliteError;
        match e {
            SqliteError::Database(e) => Self::Sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "sqlite",
                version,
                name,
                error,
            },
            SqliteError::Io(e) => Self::Io(e),
            SqliteError::Decode(message) => Self::Decode {
                backend: "sqlite",
                message,
            },
        }
    }
}

impl From<crate::data::postgres::PostgresError> for DataError {
    fn from(e: crate::data::postgres::PostgresError) -> Self {
        use crate::data::postgres::PostgresError;
        match e {
            PostgresError::Database(e) => Self::Postgres(e),
            PostgresError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "postgres",
                version,
                name,
                error,
            },
            PostgresError::Config(msg) => Self::Config(msg),
            PostgresError::Io(e) => Self::Io(e),
            PostgresError::Decode(message) => Self::Decode {
                backend: "postgres",
                message,
            },
        }
    }
}

impl From<validator::ValidationErrors> for DataError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<IdError> for DataError {
    fn from(e: IdError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Record operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordOp {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for RecordOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Error identity without the attached cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    CacheRead,
    CacheWrite,
    CacheDelete,
    UnexpectedCachedResource,
    Record(ResourceType, RecordOp),
}

/// Error returned by every repository
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Cache read failed: {0}")]
    CacheRead(#[source] CacheError),

    #[error("Cache write failed: {0}")]
    CacheWrite(#[source] CacheError),

    #[error("Cache delete failed: {0}")]
    CacheDelete(#[source] CacheError),

    #[error("Unexpected cached resource type: {0}")]
    UnexpectedCachedResource(ResourceType),

    #[error("Failed to {op} {resource}: {source}")]
    Record {
        resource: ResourceType,
        op: RecordOp,
        #[source]
        source: DataError,
    },
}

impl RepositoryError {
    pub fn record(resource: ResourceType, op: RecordOp, source: impl Into<DataError>) -> Self {
        Self::Record {
            resource,
            op,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::CacheRead(_) => ErrorKind::CacheRead,
            Self::CacheWrite(_) => ErrorKind::CacheWrite,
            Self::CacheDelete(_) => ErrorKind::CacheDelete,
            Self::UnexpectedCachedResource(_) => ErrorKind::UnexpectedCachedResource,
            Self::Record { resource, op, .. } => ErrorKind::Record(*resource, *op),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Wiring errors raised while building caches, stores and repositories
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No cache client configured")]
    NoClient,

    #[error("No database pool configured")]
    NoPool,

    #[error("No database driver for '{0}'")]
    NoDriver(String),

    #[error("Failed to initialise logger: {0}")]
    NoLogger(String),

    #[error("No tracer scope configured")]
    NoTracer,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid database: expected {expected}, found {found}")]
    InvalidDatabase {
        expected: &'static str,
        found: &'static str,
    },

    #[error("No record repository configured")]
    InvalidRepository,
}
