//! PostgreSQL repositories
//!
//! Same contract as the SQLite functions: `None` or `false` for missing
//! rows, validation and error mapping left to `repository_impl`.

pub mod assignment;
pub mod comment;
pub mod namespace;
pub mod notification;
pub mod permission;
pub mod project;
pub mod role;

use std::fmt::Display;
use std::str::FromStr;

use crate::data::postgres::PostgresError;
use crate::data::types::{Id, ids_from_json};

pub(crate) fn decode_id(raw: &str) -> Result<Id, PostgresError> {
    raw.parse().map_err(PostgresError::decode)
}

pub(crate) fn decode_ids(raw: &str) -> Result<Vec<Id>, PostgresError> {
    ids_from_json(raw).map_err(PostgresError::decode)
}

pub(crate) fn decode_id_column(rows: Vec<String>) -> Result<Vec<Id>, PostgresError> {
    rows.iter().map(|raw| decode_id(raw)).collect()
}

pub(crate) fn decode_enum<T>(raw: &str) -> Result<T, PostgresError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(PostgresError::decode)
}

/// Postgres has no unsigned integers; page bounds bind as BIGINT
pub(crate) fn page(offset: u32, limit: u32) -> (i64, i64) {
    (i64::from(offset), i64::from(limit))
}
