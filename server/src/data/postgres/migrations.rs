//! PostgreSQL migration management
//!
//! Handles schema initialization and versioned migrations. The layout of
//! `schema_version` and `schema_migrations` matches the SQLite store.

use std::time::Instant;

use sqlx::PgPool;

use super::error::PostgresError;
use super::schema::{MIGRATION_V2, SCHEMA, SCHEMA_VERSION};
use crate::utils::crypto::sha256_hex;

/// Run all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<i32, PostgresError> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = 'schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    let current_version: Option<i32> = if table_exists {
        sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional(pool)
            .await?
    } else {
        None
    };

    match current_version {
        None => {
            tracing::debug!(version = SCHEMA_VERSION, "Applying initial PostgreSQL schema");
            apply_initial_schema(pool).await?;
            Ok(SCHEMA_VERSION)
        }
        Some(v) if v < SCHEMA_VERSION => {
            tracing::debug!(from = v, to = SCHEMA_VERSION, "Migrating PostgreSQL schema");
            for version in (v + 1)..=SCHEMA_VERSION {
                apply_versioned_migration(pool, version).await?;
            }
            Ok(SCHEMA_VERSION)
        }
        Some(v) => {
            if v > SCHEMA_VERSION {
                tracing::warn!(
                    database = v,
                    application = SCHEMA_VERSION,
                    "PostgreSQL schema is newer than this build"
                );
            } else {
                tracing::debug!(version = v, "PostgreSQL schema is up to date");
            }
            Ok(v)
        }
    }
}

fn migration(version: i32) -> Result<(&'static str, &'static str), PostgresError> {
    match version {
        2 => Ok(("add_notifications_unread_index", MIGRATION_V2)),
        _ => Err(PostgresError::MigrationFailed {
            version,
            name: "unknown".to_string(),
            error: format!("No migration defined for version {}", version),
        }),
    }
}

async fn apply_initial_schema(pool: &PgPool) -> Result<(), PostgresError> {
    let start = Instant::now();
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(SCHEMA).execute(&mut *tx).await?;

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description)
         VALUES (1, $1, $2, 'Initial schema')
         ON CONFLICT (id) DO UPDATE SET version = $1, applied_at = $2",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success)
         VALUES ($1, 'initial_schema', $2, $3, $4, TRUE)
         ON CONFLICT (version) DO NOTHING",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .bind(sha256_hex(SCHEMA))
    .bind(start.elapsed().as_millis() as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::debug!(version = SCHEMA_VERSION, "PostgreSQL schema applied");
    Ok(())
}

async fn apply_versioned_migration(pool: &PgPool, version: i32) -> Result<(), PostgresError> {
    let start = Instant::now();
    let (name, sql) = migration(version)?;
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| PostgresError::MigrationFailed {
            version,
            name: name.to_string(),
            error: e.to_string(),
        })?;

    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE schema_version SET version = $1, applied_at = $2, description = $3 WHERE id = 1")
        .bind(version)
        .bind(now)
        .bind(name)
        .execute(&mut *tx)
        .await?;

    let elapsed = start.elapsed().as_millis() as i64;
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success)
         VALUES ($1, $2, $3, $4, $5, TRUE)",
    )
    .bind(version)
    .bind(name)
    .bind(now)
    .bind(sha256_hex(sql))
    .bind(elapsed)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::debug!(version, name, elapsed_ms = elapsed, "Applied PostgreSQL migration");
    Ok(())
}
