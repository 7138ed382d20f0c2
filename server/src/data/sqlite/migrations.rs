//! Schema versioning for SQLite
//!
//! Fresh databases get the full schema in one step. Older databases are
//! brought forward one versioned migration at a time; each step is recorded
//! in `schema_migrations` with a SHA-256 checksum of the SQL it ran.

use std::time::Instant;

use sqlx::{Sqlite, SqlitePool, Transaction};

use super::error::SqliteError;
use super::schema::{MIGRATION_V2, SCHEMA, SCHEMA_VERSION};
use crate::utils::crypto::sha256_hex;

/// Bring the database up to [`SCHEMA_VERSION`]
pub async fn run_migrations(pool: &SqlitePool) -> Result<i32, SqliteError> {
    let current = applied_version(pool).await?;

    if current == 0 {
        tracing::debug!(version = SCHEMA_VERSION, "Initializing SQLite schema");
        apply_initial_schema(pool).await?;
        return Ok(SCHEMA_VERSION);
    }

    if current >= SCHEMA_VERSION {
        tracing::debug!(version = current, "SQLite schema is up to date");
        return Ok(current);
    }

    for version in (current + 1)..=SCHEMA_VERSION {
        let (name, sql) = migration(version)?;
        apply_versioned_migration(pool, version, name, sql).await?;
    }
    Ok(SCHEMA_VERSION)
}

/// Version recorded in `schema_version`, 0 for an empty database
pub async fn applied_version(pool: &SqlitePool) -> Result<i32, SqliteError> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(pool)
    .await?;
    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

fn migration(version: i32) -> Result<(&'static str, &'static str), SqliteError> {
    match version {
        2 => Ok(("add_notifications_unread_index", MIGRATION_V2)),
        _ => Err(SqliteError::MigrationFailed {
            version,
            name: "unknown".to_string(),
            error: format!("Unknown migration version: {}", version),
        }),
    }
}

async fn apply_initial_schema(pool: &SqlitePool) -> Result<(), SqliteError> {
    let start = Instant::now();
    let mut tx = pool.begin().await?;

    sqlx::query(SCHEMA).execute(&mut *tx).await?;

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description) VALUES (1, ?, ?, 'Initial schema')",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    record_migration(&mut tx, SCHEMA_VERSION, "initial_schema", SCHEMA, start).await?;
    tx.commit().await?;

    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Applied initial schema");
    Ok(())
}

async fn apply_versioned_migration(
    pool: &SqlitePool,
    version: i32,
    name: &str,
    sql: &str,
) -> Result<(), SqliteError> {
    let start = Instant::now();
    let mut tx = pool.begin().await?;

    for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| SqliteError::MigrationFailed {
                version,
                name: name.to_string(),
                error: format!(
                    "Failed at statement: {} - {}",
                    &statement[..statement.len().min(50)],
                    e
                ),
            })?;
    }

    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE schema_version SET version = ?, applied_at = ?, description = ? WHERE id = 1")
        .bind(version)
        .bind(now)
        .bind(name)
        .execute(&mut *tx)
        .await?;

    record_migration(&mut tx, version, name, sql, start).await?;
    tx.commit().await?;

    tracing::debug!(version, name, "Applied SQLite migration");
    Ok(())
}

async fn record_migration(
    tx: &mut Transaction<'_, Sqlite>,
    version: i32,
    name: &str,
    sql: &str,
    start: Instant,
) -> Result<(), SqliteError> {
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success) VALUES (?, ?, ?, ?, ?, 1)",
    )
    .bind(version)
    .bind(name)
    .bind(chrono::Utc::now().timestamp())
    .bind(sha256_hex(sql))
    .bind(start.elapsed().as_millis() as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
