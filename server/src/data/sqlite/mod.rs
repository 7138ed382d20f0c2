//! SQLite record store
//!
//! Embedded deployments keep every entity in one database file with:
//! - WAL mode for concurrent reads during writes
//! - Foreign keys on (role membership cascades with its role)
//! - A busy timeout instead of immediate `SQLITE_BUSY` errors
//!
//! Use PostgreSQL for multi-instance deployments.

pub mod error;
mod migrations;
pub mod repositories;
mod repository_impl;
pub mod schema;

pub use error::SqliteError;
pub use sqlx::SqlitePool;

use std::path::Path;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::log::LevelFilter;

use crate::core::constants::{SQLITE_BUSY_TIMEOUT_SECS, SQLITE_CACHE_SIZE, SQLITE_MAX_CONNECTIONS};

/// SQLite database service
///
/// Created once at startup and shared behind an `Arc`; it implements every
/// repository trait directly.
pub struct SqliteService {
    pool: SqlitePool,
}

impl SqliteService {
    /// Open (creating if missing) the database at `db_path` and migrate it
    pub async fn init(db_path: &Path) -> Result<Self, SqliteError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS))
            .pragma("cache_size", SQLITE_CACHE_SIZE)
            .pragma("temp_store", "MEMORY")
            .log_statements(LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let version = migrations::run_migrations(&pool).await?;

        tracing::debug!(path = %db_path.display(), schema_version = version, "SqliteService initialized");
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema applied
    ///
    /// A single connection keeps every query on the same memory database.
    pub async fn in_memory() -> Result<Self, SqliteError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true)
            .log_statements(LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn schema_version(&self) -> Result<i32, SqliteError> {
        migrations::applied_version(&self.pool).await
    }

    pub async fn health_check(&self) -> Result<(), SqliteError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("SQLite pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trellis.db");

        let service = SqliteService::init(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(service.schema_version().await.unwrap(), schema::SCHEMA_VERSION);
        assert!(service.health_check().await.is_ok());
        service.close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trellis.db");

        SqliteService::init(&path).await.unwrap().close().await;
        let service = SqliteService::init(&path).await.unwrap();
        assert_eq!(service.schema_version().await.unwrap(), schema::SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_in_memory() {
        let service = SqliteService::in_memory().await.unwrap();
        assert!(service.health_check().await.is_ok());
    }
}
