//! Notification repository for SQLite operations
//!
//! Every lookup is scoped by recipient, so a user can never read or change
//! another user's notifications by id alone.

use sqlx::SqlitePool;

use super::decode_id;
use crate::data::sqlite::SqliteError;
use crate::data::types::{Id, Notification};

type NotificationTuple = (String, String, String, String, bool, i64, Option<i64>);

const COLUMNS: &str = "id, title, description, recipient, read, created_at, updated_at";

fn from_row(
    (id, title, description, recipient, read, created_at, updated_at): NotificationTuple,
) -> Result<Notification, SqliteError> {
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
    pool: &SqlitePool,
    notification: &Notification,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, title, description, recipient, read, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
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
    pool: &SqlitePool,
    id: &Id,
    recipient: &Id,
) -> Result<Option<Notification>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM notifications WHERE id = ? AND recipient = ?");
    let row = sqlx::query_as::<_, NotificationTuple>(&sql)
        .bind(id.to_string())
        .bind(recipient.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

/// Notifications of a recipient, newest first
pub async fn list_by_recipient(
    pool: &SqlitePool,
    recipient: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Notification>, SqliteError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM notifications WHERE recipient = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
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
    pool: &SqlitePool,
    id: &Id,
    recipient: &Id,
    read: bool,
) -> Result<Option<Notification>, SqliteError> {
    let sql = format!(
        r#"
        UPDATE notifications
        SET read = ?, updated_at = CAST(strftime('%s', 'now') AS INTEGER)
        WHERE id = ? AND recipient = ?
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
    pool: &SqlitePool,
    id: &Id,
    recipient: &Id,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND recipient = ?")
        .bind(id.to_string())
        .bind(recipient.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
