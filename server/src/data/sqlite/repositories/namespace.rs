//! Namespace repository for SQLite operations

use sqlx::SqlitePool;

use super::{decode_id, decode_id_column, decode_ids};
use crate::data::sqlite::SqliteError;
use crate::data::types::{Id, Namespace, NamespacePatch, ids_to_json};

type NamespaceTuple = (String, String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, organization_id, name, description, documents, created_at, updated_at";

async fn from_row(pool: &SqlitePool, row: NamespaceTuple) -> Result<Namespace, SqliteError> {
    let (id, organization, name, description, documents, created_at, updated_at) = row;
    let id = decode_id(&id)?;
    let projects = project_ids(pool, &id).await?;
    Ok(Namespace {
        id,
        organization: decode_id(&organization)?,
        name,
        description,
        projects,
        documents: decode_ids(&documents)?,
        created_at,
        updated_at,
    })
}

async fn project_ids(pool: &SqlitePool, namespace: &Id) -> Result<Vec<Id>, SqliteError> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT id FROM projects WHERE namespace_id = ? ORDER BY created_at, id")
            .bind(namespace.to_string())
            .fetch_all(pool)
            .await?;
    decode_id_column(rows)
}

pub async fn create_namespace(pool: &SqlitePool, namespace: &Namespace) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO namespaces (id, organization_id, name, description, documents, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(namespace.id.to_string())
    .bind(namespace.organization.to_string())
    .bind(&namespace.name)
    .bind(&namespace.description)
    .bind(ids_to_json(&namespace.documents))
    .bind(namespace.created_at)
    .bind(namespace.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_namespace(pool: &SqlitePool, id: &Id) -> Result<Option<Namespace>, SqliteError> {
    let sql = format!("SELECT {COLUMNS} FROM namespaces WHERE id = ?");
    let row = sqlx::query_as::<_, NamespaceTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

/// Namespaces of an organization, oldest first
pub async fn list_by_organization(
    pool: &SqlitePool,
    organization: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Namespace>, SqliteError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM namespaces WHERE organization_id = ? ORDER BY created_at, id LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, NamespaceTuple>(&sql)
        .bind(organization.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let mut namespaces = Vec::with_capacity(rows.len());
    for row in rows {
        namespaces.push(from_row(pool, row).await?);
    }
    Ok(namespaces)
}

/// Apply the set fields of `patch`; `None` when the namespace does not exist
pub async fn update_namespace(
    pool: &SqlitePool,
    id: &Id,
    patch: &NamespacePatch,
    updated_at: i64,
) -> Result<Option<Namespace>, SqliteError> {
    let sql = format!(
        r#"
        UPDATE namespaces SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            documents = COALESCE(?, documents),
            updated_at = ?
        WHERE id = ?
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, NamespaceTuple>(&sql)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.documents.as_deref().map(ids_to_json))
        .bind(updated_at)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn delete_namespace(pool: &SqlitePool, id: &Id) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM namespaces WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
