//! Role repository for PostgreSQL operations

use sqlx::PgPool;

use super::{decode_id, decode_id_column, page};
use crate::data::postgres::PostgresError;
use crate::data::types::{Id, Role, RolePatch};

type RoleTuple = (String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, name, description, belongs_to, created_at, updated_at";

async fn from_row(pool: &PgPool, row: RoleTuple) -> Result<Role, PostgresError> {
    let (id, name, description, belongs_to, created_at, updated_at) = row;
    let id = decode_id(&id)?;
    let members: Vec<String> = sqlx::query_scalar(
        "SELECT user_id FROM role_members WHERE role_id = $1 ORDER BY created_at, user_id",
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;
    let permissions: Vec<String> =
        sqlx::query_scalar("SELECT id FROM permissions WHERE subject = $1 ORDER BY created_at, id")
            .bind(id.to_string())
            .fetch_all(pool)
            .await?;
    Ok(Role {
        id,
        name,
        description,
        belongs_to: decode_id(&belongs_to)?,
        members: decode_id_column(members)?,
        permissions: decode_id_column(permissions)?,
        created_at,
        updated_at,
    })
}

/// Insert the role and its creator as first member in one transaction
pub async fn create_role(pool: &PgPool, role: &Role, created_by: &Id) -> Result<(), PostgresError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO roles (id, name, description, belongs_to, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(role.id.to_string())
    .bind(&role.name)
    .bind(&role.description)
    .bind(role.belongs_to.to_string())
    .bind(role.created_at)
    .bind(role.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO role_members (role_id, user_id, created_at) VALUES ($1, $2, $3)")
        .bind(role.id.to_string())
        .bind(created_by.to_string())
        .bind(role.created_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_role(pool: &PgPool, id: &Id) -> Result<Option<Role>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM roles WHERE id = $1");
    let row = sqlx::query_as::<_, RoleTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn list_by_owner(
    pool: &PgPool,
    belongs_to: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Role>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let sql = format!(
        "SELECT {COLUMNS} FROM roles WHERE belongs_to = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3"
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
    pool: &PgPool,
    id: &Id,
    patch: &RolePatch,
    updated_at: i64,
) -> Result<Option<Role>, PostgresError> {
    let sql = format!(
        r#"
        UPDATE roles SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            updated_at = $3
        WHERE id = $4
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

/// Returns `false` when no role `role` belongs to `belongs_to`
pub async fn add_member(
    pool: &PgPool,
    role: &Id,
    member: &Id,
    belongs_to: &Id,
    created_at: i64,
) -> Result<bool, PostgresError> {
    let mut tx = pool.begin().await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1 AND belongs_to = $2)")
            .bind(role.to_string())
            .bind(belongs_to.to_string())
            .fetch_one(&mut *tx)
            .await?;
    if !exists {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO role_members (role_id, user_id, created_at) VALUES ($1, $2, $3) ON CONFLICT (role_id, user_id) DO NOTHING",
    )
    .bind(role.to_string())
    .bind(member.to_string())
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn remove_member(
    pool: &PgPool,
    role: &Id,
    member: &Id,
    belongs_to: &Id,
) -> Result<bool, PostgresError> {
    let result = sqlx::query(
        r#"
        DELETE FROM role_members
        WHERE role_id = $1 AND user_id = $2
          AND EXISTS(SELECT 1 FROM roles WHERE id = role_members.role_id AND belongs_to = $3)
        "#,
    )
    .bind(role.to_string())
    .bind(member.to_string())
    .bind(belongs_to.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_role(pool: &PgPool, id: &Id) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
