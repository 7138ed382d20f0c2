//! Comment repository for PostgreSQL operations

use sqlx::PgPool;

use super::{decode_id, page};
use crate::data::postgres::PostgresError;
use crate::data::types::{Comment, Id};

type CommentTuple = (String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, content, created_by, belongs_to, created_at, updated_at";

fn from_row(
    (id, content, created_by, belongs_to, created_at, updated_at): CommentTuple,
) -> Result<Comment, PostgresError> {
    Ok(Comment {
        id: decode_id(&id)?,
        content,
        created_by: decode_id(&created_by)?,
        belongs_to: decode_id(&belongs_to)?,
        created_at,
        updated_at,
    })
}

pub async fn create_comment(pool: &PgPool, comment: &Comment) -> Result<(), PostgresError> {
    sqlx::query(
        "INSERT INTO comments (id, content, created_by, belongs_to, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(comment.id.to_string())
    .bind(&comment.content)
    .bind(comment.created_by.to_string())
    .bind(comment.belongs_to.to_string())
    .bind(comment.created_at)
    .bind(comment.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_comment(pool: &PgPool, id: &Id) -> Result<Option<Comment>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM comments WHERE id = $1");
    let row = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn list_by_parent(
    pool: &PgPool,
    parent: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Comment>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let sql = format!(
        "SELECT {COLUMNS} FROM comments WHERE belongs_to = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(parent.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(from_row).collect()
}

pub async fn update_content(
    pool: &PgPool,
    id: &Id,
    content: &str,
    updated_at: i64,
) -> Result<Option<Comment>, PostgresError> {
    let sql = format!(
        "UPDATE comments SET content = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(content)
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn delete_comment(pool: &PgPool, id: &Id) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
