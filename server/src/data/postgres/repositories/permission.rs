//! Permission repository for PostgreSQL operations

use sqlx::PgPool;

use super::{decode_enum, decode_id};
use crate::data::postgres::PostgresError;
use crate::data::types::{Id, Permission, PermissionKind};

type PermissionTuple = (String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, kind, subject, target, created_at, updated_at";

fn from_row(
    (id, kind, subject, target, created_at, updated_at): PermissionTuple,
) -> Result<Permission, PostgresError> {
    Ok(Permission {
        id: decode_id(&id)?,
        kind: decode_enum(&kind)?,
        subject: decode_id(&subject)?,
        target: decode_id(&target)?,
        created_at,
        updated_at,
    })
}

async fn list_where(
    pool: &PgPool,
    filter: &str,
    binds: &[&Id],
) -> Result<Vec<Permission>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM permissions WHERE {filter} ORDER BY created_at, id");
    let mut query = sqlx::query_as::<_, PermissionTuple>(&sql);
    for id in binds {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(pool).await?;
    rows.into_iter().map(from_row).collect()
}

pub async fn create_permission(pool: &PgPool, permission: &Permission) -> Result<(), PostgresError> {
    sqlx::query(
        "INSERT INTO permissions (id, kind, subject, target, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(permission.id.to_string())
    .bind(permission.kind.as_str())
    .bind(permission.subject.to_string())
    .bind(permission.target.to_string())
    .bind(permission.created_at)
    .bind(permission.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_permission(pool: &PgPool, id: &Id) -> Result<Option<Permission>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM permissions WHERE id = $1");
    let row = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn list_by_subject(pool: &PgPool, subject: &Id) -> Result<Vec<Permission>, PostgresError> {
    list_where(pool, "subject = $1", &[subject]).await
}

pub async fn list_by_target(pool: &PgPool, target: &Id) -> Result<Vec<Permission>, PostgresError> {
    list_where(pool, "target = $1", &[target]).await
}

pub async fn list_by_subject_and_target(
    pool: &PgPool,
    subject: &Id,
    target: &Id,
) -> Result<Vec<Permission>, PostgresError> {
    list_where(pool, "subject = $1 AND target = $2", &[subject, target]).await
}

pub async fn has_permission(
    pool: &PgPool,
    subject: &Id,
    target: &Id,
    kind: PermissionKind,
) -> Result<bool, PostgresError> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM permissions
            WHERE subject = $1 AND target = $2 AND (kind = $3 OR kind = 'all')
        )
        "#,
    )
    .bind(subject.to_string())
    .bind(target.to_string())
    .bind(kind.as_str())
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn has_any_relation(pool: &PgPool, subject: &Id, target: &Id) -> Result<bool, PostgresError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM permissions WHERE subject = $1 AND target = $2)",
    )
    .bind(subject.to_string())
    .bind(target.to_string())
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn update_kind(
    pool: &PgPool,
    id: &Id,
    kind: PermissionKind,
    updated_at: i64,
) -> Result<Option<Permission>, PostgresError> {
    let sql = format!(
        "UPDATE permissions SET kind = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(kind.as_str())
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn delete_permission(pool: &PgPool, id: &Id) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
