//! SQLite repositories
//!
//! Plain functions over a pool, one module per entity. They return `None`
//! or `false` for missing rows and leave validation and error mapping to
//! the trait implementations in `repository_impl`.

pub mod assignment;
pub mod comment;
pub mod namespace;
pub mod notification;
pub mod permission;
pub mod project;
pub mod role;

use std::fmt::Display;
use std::str::FromStr;

use crate::data::sqlite::SqliteError;
use crate::data::types::{Id, ids_from_json};

pub(crate) fn decode_id(raw: &str) -> Result<Id, SqliteError> {
    raw.parse().map_err(SqliteError::decode)
}

pub(crate) fn decode_ids(raw: &str) -> Result<Vec<Id>, SqliteError> {
    ids_from_json(raw).map_err(SqliteError::decode)
}

pub(crate) fn decode_id_column(rows: Vec<String>) -> Result<Vec<Id>, SqliteError> {
    rows.iter().map(|raw| decode_id(raw)).collect()
}

pub(crate) fn decode_enum<T>(raw: &str) -> Result<T, SqliteError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(SqliteError::decode)
}

#[cfg(test)]
pub(crate) async fn setup_test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query(crate::data::sqlite::schema::SCHEMA)
        .execute(&pool)
        .await
        .unwrap();
    pool
}
