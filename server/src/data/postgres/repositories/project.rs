//! Project repository for PostgreSQL operations
//!
//! `teams` is derived from the roles that belong to each project.

use sqlx::PgPool;

use super::{decode_enum, decode_id, decode_id_column, decode_ids, page};
use crate::data::postgres::PostgresError;
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

async fn from_row(pool: &PgPool, row: ProjectTuple) -> Result<Project, PostgresError> {
    let (id, namespace, key, name, description, status, documents, issues, created_at, updated_at) =
        row;
    let id = decode_id(&id)?;
    let teams: Vec<String> =
        sqlx::query_scalar("SELECT id FROM roles WHERE belongs_to = $1 ORDER BY created_at, id")
            .bind(id.to_string())
            .fetch_all(pool)
            .await?;
    Ok(Project {
        id,
        namespace: decode_id(&namespace)?,
        key,
        name,
        description,
        status: decode_enum(&status)?,
        teams: decode_id_column(teams)?,
        documents: decode_ids(&documents)?,
        issues: decode_ids(&issues)?,
        created_at,
        updated_at,
    })
}

async fn fetch_one_where(
    pool: &PgPool,
    filter: &str,
    value: String,
) -> Result<Option<Project>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM projects WHERE {filter}");
    let row = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn create_project(pool: &PgPool, project: &Project) -> Result<(), PostgresError> {
    sqlx::query(
        r#"
        INSERT INTO projects
            (id, namespace_id, key, name, description, status, documents, issues, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
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

pub async fn get_project(pool: &PgPool, id: &Id) -> Result<Option<Project>, PostgresError> {
    fetch_one_where(pool, "id = $1", id.to_string()).await
}

pub async fn get_project_by_key(pool: &PgPool, key: &str) -> Result<Option<Project>, PostgresError> {
    fetch_one_where(pool, "key = $1", key.to_string()).await
}

pub async fn list_by_namespace(
    pool: &PgPool,
    namespace: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Project>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let sql = format!(
        "SELECT {COLUMNS} FROM projects WHERE namespace_id = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, ProjectTuple>(&sql)
        .bind(namespace.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        projects.push(from_row(pool, row).await?);
    }
    Ok(projects)
}

pub async fn update_project(
    pool: &PgPool,
    id: &Id,
    patch: &ProjectPatch,
    updated_at: i64,
) -> Result<Option<Project>, PostgresError> {
    let sql = format!(
        r#"
        UPDATE projects SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            status = COALESCE($3, status),
            documents = COALESCE($4, documents),
            issues = COALESCE($5, issues),
            updated_at = $6
        WHERE id = $7
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

pub async fn delete_project(pool: &PgPool, id: &Id) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
