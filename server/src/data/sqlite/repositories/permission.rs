//! Permission repository for SQLite operations

use sqlx::SqlitePool;

use super::{decode_enum, decode_id};
use crate::data::sqlite::SqliteError;
use crate::data::types::{Id, Permission, PermissionKind};

type PermissionTuple = (String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, kind, subject, target, created_at, updated_at";

fn from_row(
    (id, kind, subject, target, created_at, updated_at): PermissionTuple,
) -> Result<Permission, SqliteError> {
    Ok(Permission {
        id: decode_id(&id)?,
        kind: decode_enum(&kind)?,
        subject: decode_id(&subject)?,
        target: decode_id(&target)?,
        created_at,
        updated_at,
    })
}

pub async fn create_permission(pool: &SqlitePool, permission: &Permission) -> Result<(), SqliteError> {
    sqlx::query(
        "INSERT INTO permissions (id, kind, subject, target, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
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

pub async fn get_permission(pool: &SqlitePool, id: &Id) -> Result<Option<Permission>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM permissions WHERE id = ?");
    let row = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn list_by_subject(pool: &SqlitePool, subject: &Id) -> Result<Vec<Permission>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM permissions WHERE subject = ? ORDER BY created_at, id");
    let rows = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(subject.to_string())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(from_row).collect()
}

pub async fn list_by_target(pool: &SqlitePool, target: &Id) -> Result<Vec<Permission>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM permissions WHERE target = ? ORDER BY created_at, id");
    let rows = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(target.to_string())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(from_row).collect()
}

pub async fn list_by_subject_and_target(
    pool: &SqlitePool,
    subject: &Id,
    target: &Id,
) -> Result<Vec<Permission>, SqliteError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM permissions WHERE subject = ? AND target = ? ORDER BY created_at, id"
    );
    let rows = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(subject.to_string())
        .bind(target.to_string())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(from_row).collect()
}

/// `kind` or `all` held by `subject` on `target`
pub async fn has_permission(
    pool: &SqlitePool,
    subject: &Id,
    target: &Id,
    kind: PermissionKind,
) -> Result<bool, SqliteError> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM permissions
            WHERE subject = ? AND target = ? AND (kind = ? OR kind = 'all')
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

pub async fn has_any_relation(pool: &SqlitePool, subject: &Id, target: &Id) -> Result<bool, SqliteError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM permissions WHERE subject = ? AND target = ?)",
    )
    .bind(subject.to_string())
    .bind(target.to_string())
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn update_kind(
    pool: &SqlitePool,
    id: &Id,
    kind: PermissionKind,
    updated_at: i64,
) -> Result<Option<Permission>, SqliteError> {
    let sql = format!("UPDATE permissions SET kind = ?, updated_at = ? WHERE id = ? RETURNING {COLUMNS}");
    let row = sqlx::query_as::<_, PermissionTuple>(&sql)
        .bind(kind.as_str())
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(from_row).transpose()
}

pub async fn delete_permission(pool: &SqlitePool, id: &Id) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::setup_test_pool;
    use crate::data::types::ResourceType;

    fn role() -> Id {
        Id::new(ResourceType::Role, "r1")
    }

    fn project() -> Id {
        Id::new(ResourceType::Project, "p1")
    }

    #[tokio::test]
    async fn test_create_and_query_permissions() {
        let pool = setup_test_pool().await;
        let p = Permission::new(PermissionKind::Read, role(), project());
        create_permission(&pool, &p).await.unwrap();
        let other = Permission::new(
            PermissionKind::Write,
            role(),
            Id::new(ResourceType::Project, "p2"),
        );
        create_permission(&pool, &other).await.unwrap();

        assert_eq!(get_permission(&pool, &p.id).await.unwrap(), Some(p.clone()));
        assert_eq!(list_by_subject(&pool, &role()).await.unwrap().len(), 2);
        assert_eq!(list_by_target(&pool, &project()).await.unwrap(), vec![p.clone()]);
        assert_eq!(
            list_by_subject_and_target(&pool, &role(), &project()).await.unwrap(),
            vec![p]
        );
    }

    #[tokio::test]
    async fn test_has_permission_honours_all() {
        let pool = setup_test_pool().await;
        create_permission(&pool, &Permission::new(PermissionKind::Read, role(), project()))
            .await
            .unwrap();

        assert!(has_permission(&pool, &role(), &project(), PermissionKind::Read).await.unwrap());
        assert!(!has_permission(&pool, &role(), &project(), PermissionKind::Delete).await.unwrap());

        let target = Id::new(ResourceType::Document, "d1");
        create_permission(&pool, &Permission::new(PermissionKind::All, role(), target.clone()))
            .await
            .unwrap();
        assert!(has_permission(&pool, &role(), &target, PermissionKind::Delete).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_any_relation() {
        let pool = setup_test_pool().await;
        assert!(!has_any_relation(&pool, &role(), &project()).await.unwrap());
        create_permission(&pool, &Permission::new(PermissionKind::Create, role(), project()))
            .await
            .unwrap();
        assert!(has_any_relation(&pool, &role(), &project()).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = setup_test_pool().await;
        let p = Permission::new(PermissionKind::Read, role(), project());
        create_permission(&pool, &p).await.unwrap();

        let updated = update_kind(&pool, &p.id, PermissionKind::All, 5).await.unwrap().unwrap();
        assert_eq!(updated.kind, PermissionKind::All);
        assert_eq!(updated.updated_at, Some(5));

        assert!(delete_permission(&pool, &p.id).await.unwrap());
        assert_eq!(update_kind(&pool, &p.id, PermissionKind::Read, 6).await.unwrap(), None);
    }
}
