//! Comment repository for SQLite operations

use sqlx::SqlitePool;

use super::decode_id;
use crate::data::sqlite::SqliteError;
use crate::data::types::{Comment, Id};

type CommentTuple = (String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, content, created_by, belongs_to, created_at, updated_at";

fn from_row(
    (id, content, created_by, belongs_to, created_at, updated_at): CommentTuple,
) -> Result<Comment, SqliteError> {
    Ok(Comment {
        id: decode_id(&id)?,
        content,
        created_by: decode_id(&created_by)?,
        belongs_to: decode_id(&belongs_to)?,
        created_at,
        updated_at,
    })
}

pub async fn create_comment(pool: &SqlitePool, comment: &Comment) -> Result<(), SqliteError> {
    sqlx::query(
        "INSERT INTO comments (id, content, created_by, belongs_to, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
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

pub async fn get_comment(pool: &SqlitePool, id: &Id) -> Result<Option<Comment>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM comments WHERE id = ?");
    let row = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

/// Comments under an issue or document, oldest first
pub async fn list_by_parent(
    pool: &SqlitePool,
    parent: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Comment>, SqliteError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM comments WHERE belongs_to = ? ORDER BY created_at, id LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(parent.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(from_row).collect()
}

/// Replace the content; `None` when the comment does not exist
pub async fn update_content(
    pool: &SqlitePool,
    id: &Id,
    content: &str,
    updated_at: i64,
) -> Result<Option<Comment>, SqliteError> {
    let sql = format!("UPDATE comments SET content = ?, updated_at = ? WHERE id = ? RETURNING {COLUMNS}");
    let row = sqlx::query_as::<_, CommentTuple>(&sql)
        .bind(content)
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn delete_comment(pool: &SqlitePool, id: &Id) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
