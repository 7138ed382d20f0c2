//! Role repository for SQLite operations
//!
//! Members live in `role_members` and are removed with their role. The
//! permission list is derived from permissions whose subject is the role.

use sqlx::SqlitePool;

use super::{decode_id, decode_id_column};
use crate::data::sqlite::SqliteError;
use crate::data::types::{Id, Role, RolePatch};

type RoleTuple = (String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, name, description, belongs_to, created_at, updated_at";

async fn from_row(pool: &SqlitePool, row: RoleTuple) -> Result<Role, SqliteError> {
    let (id, name, description, belongs_to, created_at, updated_at) = row;
    let id = decode_id(&id)?;
    let members = member_ids(pool, &id).await?;
    let permissions = permission_ids(pool, &id).await?;
    Ok(Role {
        id,
        name,
        description,
        belongs_to: decode_id(&belongs_to)?,
        members,
        permissions,
        created_at,
        updated_at,
    })
}

async fn member_ids(pool: &SqlitePool, role: &Id) -> Result<Vec<Id>, SqliteError> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT user_id FROM role_members WHERE role_id = ? ORDER BY created_at, user_id",
    )
    .bind(role.to_string())
    .fetch_all(pool)
    .await?;
    decode_id_column(rows)
}

async fn permission_ids(pool: &SqlitePool, role: &Id) -> Result<Vec<Id>, SqliteError> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT id FROM permissions WHERE subject = ? ORDER BY created_at, id")
            .bind(role.to_string())
            .fetch_all(pool)
            .await?;
    decode_id_column(rows)
}

/// Insert the role and its creator as first member in one transaction
pub async fn create_role(pool: &SqlitePool, role: &Role, created_by: &Id) -> Result<(), SqliteError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO roles (id, name, description, belongs_to, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(role.id.to_string())
    .bind(&role.name)
    .bind(&role.description)
    .bind(role.belongs_to.to_string())
    .bind(role.created_at)
    .bind(role.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO role_members (role_id, user_id, created_at) VALUES (?, ?, ?)")
        .bind(role.id.to_string())
        .bind(created_by.to_string())
        .bind(role.created_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_role(pool: &SqlitePool, id: &Id) -> Result<Option<Role>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM roles WHERE id = ?");
    let row = sqlx::query_as::<_, RoleTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

/// Roles of an organization or project, oldest first
pub async fn list_by_owner(
    pool: &SqlitePool,
    belongs_to: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Role>, SqliteError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM roles WHERE belongs_to = ? ORDER BY created_at, id LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, RoleTuple>(&sql)
        .bind(belongs_to.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        roles.push(from_row(pool, row).await?);
    }
    Ok(roles)
}

pub async fn update_role(
    pool: &SqlitePool,
    id: &Id,
    patch: &RolePatch,
    updated_at: i64,
) -> Result<Option<Role>, SqliteError> {
    let sql = format!(
        r#"
        UPDATE roles SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            updated_at = ?
        WHERE id = ?
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, RoleTuple>(&sql)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

/// Add `member` to a role owned by `belongs_to`
///
/// Returns `false` when no such role exists. Adding an existing member is a
/// no-op.
pub async fn add_member(
    pool: &SqlitePool,
    role: &Id,
    member: &Id,
    belongs_to: &Id,
    created_at: i64,
) -> Result<bool, SqliteError> {
    let mut tx = pool.begin().await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = ? AND belongs_to = ?)")
            .bind(role.to_string())
            .bind(belongs_to.to_string())
            .fetch_one(&mut *tx)
            .await?;
    if !exists {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO role_members (role_id, user_id, created_at) VALUES (?, ?, ?) ON CONFLICT (role_id, user_id) DO NOTHING",
    )
    .bind(role.to_string())
    .bind(member.to_string())
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Returns `false` when the role or the membership does not exist
pub async fn remove_member(
    pool: &SqlitePool,
    role: &Id,
    member: &Id,
    belongs_to: &Id,
) -> Result<bool, SqliteError> {
    let result = sqlx::query(
        r#"
        DELETE FROM role_members
        WHERE role_id = ? AND user_id = ?
          AND EXISTS(SELECT 1 FROM roles WHERE id = role_members.role_id AND belongs_to = ?)
        "#,
    )
    .bind(role.to_string())
    .bind(member.to_string())
    .bind(belongs_to.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_role(pool: &SqlitePool, id: &Id) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
