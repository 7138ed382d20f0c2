//! Notification repository for PostgreSQL operations

use sqlx::PgPool;

use super::{decode_id, page};
use crate::data::postgres::PostgresError;
use crate::data::types::{Id, Notification};

type NotificationTuple = (String, String, String, String, bool, i64, Option<i64>);

const COLUMNS: &str = "id, title, description, recipient, read, created_at, updated_at";

fn from_row(
    (id, title, description, recipient, read, created_at, updated_at): NotificationTuple,
) -> Result<Notification, PostgresError> {
    Ok(Notification {
        id: decode_id(&id)?,
        title,
        description,
        recipient: decode_id(&recipient)?,
        read,
        created_at,
        updated_at,
    })
}

pub async fn create_notification(
    pool: &PgPool,
    notification: &Notification,
) -> Result<(), PostgresError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, title, description, recipient, read, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(notification.id.to_string())
    .bind(&notification.title)
    .bind(&notification.description)
    .bind(notification.recipient.to_string())
    .bind(notification.read)
    .bind(notification.created_at)
    .bind(notification.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_notification(
    pool: &PgPool,
    id: &Id,
    recipient: &Id,
) -> Result<Option<Notification>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1 AND recipient = $2");
    let row = sqlx::query_as::<_, NotificationTuple>(&sql)
        .bind(id.to_string())
        .bind(recipient.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

/// Newest first
pub async fn list_by_recipient(
    pool: &PgPool,
    recipient: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Notification>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let sql = format!(
        "SELECT {COLUMNS} FROM notifications WHERE recipient = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, NotificationTuple>(&sql)
        .bind(recipient.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(from_row).collect()
}

/// Set the read flag; the database clock stamps `updated_at`
pub async fn set_read(
    pool: &PgPool,
    id: &Id,
    recipient: &Id,
    read: bool,
) -> Result<Option<Notification>, PostgresError> {
    let sql = format!(
        r#"
        UPDATE notifications
        SET read = $1, updated_at = EXTRACT(EPOCH FROM NOW())::BIGINT
        WHERE id = $2 AND recipient = $3
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, NotificationTuple>(&sql)
        .bind(read)
        .bind(id.to_string())
        .bind(recipient.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn delete_notification(
    pool: &PgPool,
    id: &Id,
    recipient: &Id,
) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient = $2")
        .bind(id.to_string())
        .bind(recipient.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
