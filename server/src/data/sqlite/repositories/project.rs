//! Project repository for SQLite operations
//!
//! `teams` is not stored on the row; it is the set of roles that belong to
//! the project and is read alongside every project.

use sqlx::SqlitePool;

use super::{decode_enum, decode_id, decode_id_column, decode_ids};
use crate::data::sqlite::SqliteError;
use crate::data::types::{Id, Project, ProjectPatch, ids_to_json};

type ProjectTuple = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
);

const COLUMNS: &str =
    "id, namespace_id, key, name, description, status, documents, issues, created_at, updated_at";

async fn from_row(pool: &SqlitePool, row: ProjectTuple) -> Result<Project, SqliteError> {
    let (id, namespace, key, name, description, status, documents, issues, created_at, updated_at) =
        row;
    let id = decode_id(&id)?;
    let teams = team_ids(pool, &id).await?;
    Ok(Project {
        id,
        namespace: decode_id(&namespace)?,
        key,
        name,
        description,
        status: decode_enum(&status)?,
        teams,
        documents: decode_ids(&documents)?,
        issues: decode_ids(&issues)?,
        created_at,
        updated_at,
    })
}

async fn from_rows(pool: &SqlitePool, rows: Vec<ProjectTuple>) -> Result<Vec<Project>, SqliteError> {
    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        projects.push(from_row(pool, row).await?);
    }
    Ok(projects)
}

async fn team_ids(pool: &SqlitePool, project: &Id) -> Result<Vec<Id>, SqliteError> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT id FROM roles WHERE belongs_to = ? ORDER BY created_at, id")
            .bind(project.to_string())
            .fetch_all(pool)
            .await?;
    decode_id_column(rows)
}

pub async fn create_project(pool: &SqlitePool, project: &Project) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO projects
            (id, namespace_id, key, name, description, status, documents, issues, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.id.to_string())
    .bind(project.namespace.to_string())
    .bind(&project.key)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.as_str())
    .bind(ids_to_json(&project.documents))
    .bind(ids_to_json(&project.issues))
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_project(pool: &SqlitePool, id: &Id) -> Result<Option<Project>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM projects WHERE id = ?");
    let row = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn get_project_by_key(pool: &SqlitePool, key: &str) -> Result<Option<Project>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM projects WHERE key = ?");
    let row = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

/// Projects of a namespace, oldest first
pub async fn list_by_namespace(
    pool: &SqlitePool,
    namespace: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Project>, SqliteError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM projects WHERE namespace_id = ? ORDER BY created_at, id LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(namespace.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    from_rows(pool, rows).await
}

pub async fn update_project(
    pool: &SqlitePool,
    id: &Id,
    patch: &ProjectPatch,
    updated_at: i64,
) -> Result<Option<Project>, SqliteError> {
    let sql = format!(
        r#"
        UPDATE projects SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            status = COALESCE(?, status),
            documents = COALESCE(?, documents),
            issues = COALESCE(?, issues),
            updated_at = ?
        WHERE id = ?
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.documents.as_deref().map(ids_to_json))
        .bind(patch.issues.as_deref().map(ids_to_json))
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn delete_project(pool: &SqlitePool, id: &Id) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
