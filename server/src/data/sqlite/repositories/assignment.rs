//! Assignment repository for SQLite operations

use sqlx::SqlitePool;

use super::{decode_enum, decode_id};
use crate::data::sqlite::SqliteError;
use crate::data::types::{Assignment, Id};

type AssignmentTuple = (String, String, String, String, i64);

fn from_row(
    (id, kind, user, resource, created_at): AssignmentTuple,
) -> Result<Assignment, SqliteError> {
    Ok(Assignment {
        id: decode_id(&id)?,
        kind: decode_enum(&kind)?,
        user: decode_id(&user)?,
        resource: decode_id(&resource)?,
        created_at,
    })
}

pub async fn create_assignment(pool: &SqlitePool, assignment: &Assignment) -> Result<(), SqliteError> {
    sqlx::query(
        "INSERT INTO assignments (id, kind, user_id, resource, created_at) VALUES (?, ?, ?, ?, ?)",
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

pub async fn get_assignment(pool: &SqlitePool, id: &Id) -> Result<Option<Assignment>, SqliteError> {
    let row = sqlx::query_as::<_, AssignmentTuple>(
        "SELECT id, kind, user_id, resource, created_at FROM assignments WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(from_row).transpose()
}

/// Assignments of a user, oldest first
pub async fn list_by_user(
    pool: &SqlitePool,
    user: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Assignment>, SqliteError> {
    let rows = sqlx::query_as::<_, AssignmentTuple>(
        r#"
        SELECT id, kind, user_id, resource, created_at
        FROM assignments
        WHERE user_id = ?
        ORDER BY created_at, id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}

/// Assignments on an issue or document, oldest first
pub async fn list_by_resource(
    pool: &SqlitePool,
    resource: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Assignment>, SqliteError> {
    let rows = sqlx::query_as::<_, AssignmentTuple>(
        r#"
        SELECT id, kind, user_id, resource, created_at
        FROM assignments
        WHERE resource = ?
        ORDER BY created_at, id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(resource.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}

/// Returns `false` when no row was deleted
pub async fn delete_assignment(pool: &SqlitePool, id: &Id) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::setup_test_pool;
    use crate::data::types::{AssignmentKind, ResourceType};

    fn user(v: &str) -> Id {
        Id::new(ResourceType::User, v)
    }

    fn issue(v: &str) -> Id {
        Id::new(ResourceType::Issue, v)
    }

    #[tokio::test]
    async fn test_create_and_get_assignment() {
        let pool = setup_test_pool().await;
        let a = Assignment::new(AssignmentKind::Reviewer, user("u1"), issue("i1"));
        create_assignment(&pool, &a).await.unwrap();

        let fetched = get_assignment(&pool, &a.id).await.unwrap();
        assert_eq!(fetched, Some(a));
    }

    #[tokio::test]
    async fn test_get_assignment_not_found() {
        let pool = setup_test_pool().await;
        let missing = Id::new(ResourceType::Assignment, "missing");
        assert_eq!(get_assignment(&pool, &missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_by_user_and_resource() {
        let pool = setup_test_pool().await;
        for (u, i) in [("u1", "i1"), ("u1", "i2"), ("u2", "i1")] {
            let a = Assignment::new(AssignmentKind::Assignee, user(u), issue(i));
            create_assignment(&pool, &a).await.unwrap();
        }

        assert_eq!(list_by_user(&pool, &user("u1"), 0, 10).await.unwrap().len(), 2);
        assert_eq!(list_by_user(&pool, &user("u1"), 1, 10).await.unwrap().len(), 1);
        assert_eq!(list_by_user(&pool, &user("u1"), 0, 0).await.unwrap().len(), 0);
        assert_eq!(
            list_by_resource(&pool, &issue("i1"), 0, 10).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_assignment() {
        let pool = setup_test_pool().await;
        let a = Assignment::new(AssignmentKind::Assignee, user("u1"), issue("i1"));
        create_assignment(&pool, &a).await.unwrap();

        assert!(delete_assignment(&pool, &a.id).await.unwrap());
        assert!(!delete_assignment(&pool, &a.id).await.unwrap());
    }
}
