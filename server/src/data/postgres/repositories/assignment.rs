//! Assignment repository for PostgreSQL operations

use sqlx::PgPool;

use super::{decode_enum, decode_id, page};
use crate::data::postgres::PostgresError;
use crate::data::types::{Assignment, Id};

type AssignmentTuple = (String, String, String, String, i64);

fn from_row(
    (id, kind, user, resource, created_at): AssignmentTuple,
) -> Result<Assignment, PostgresError> {
    Ok(Assignment {
        id: decode_id(&id)?,
        kind: decode_enum(&kind)?,
        user: decode_id(&user)?,
        resource: decode_id(&resource)?,
        created_at,
    })
}

pub async fn create_assignment(pool: &PgPool, assignment: &Assignment) -> Result<(), PostgresError> {
    sqlx::query(
        "INSERT INTO assignments (id, kind, user_id, resource, created_at) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(assignment.id.to_string())
    .bind(assignment.kind.as_str())
    .bind(assignment.user.to_string())
    .bind(assignment.resource.to_string())
    .bind(assignment.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_assignment(pool: &PgPool, id: &Id) -> Result<Option<Assignment>, PostgresError> {
    let row = sqlx::query_as::<_, AssignmentTuple>(
        "SELECT id, kind, user_id, resource, created_at FROM assignments WHERE id = $1",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(from_row).transpose()
}

pub async fn list_by_user(
    pool: &PgPool,
    user: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Assignment>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let rows = sqlx::query_as::<_, AssignmentTuple>(
        r#"
        SELECT id, kind, user_id, resource, created_at
        FROM assignments
        WHERE user_id = $1
        ORDER BY created_at, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}

pub async fn list_by_resource(
    pool: &PgPool,
    resource: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Assignment>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let rows = sqlx::query_as::<_, AssignmentTuple>(
        r#"
        SELECT id, kind, user_id, resource, created_at
        FROM assignments
        WHERE resource = $1
        ORDER BY created_at, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(resource.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}

pub async fn delete_assignment(pool: &PgPool, id: &Id) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
