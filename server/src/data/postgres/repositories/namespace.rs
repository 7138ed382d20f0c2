//! Namespace repository for PostgreSQL operations

use sqlx::PgPool;

use super::{decode_id, decode_id_column, decode_ids, page};
use crate::data::postgres::PostgresError;
use crate::data::types::{Id, Namespace, NamespacePatch, ids_to_json};

type NamespaceTuple = (String, String, String, String, String, i64, Option<i64>);

const COLUMNS: &str = "id, organization_id, name, description, documents, created_at, updated_at";

async fn from_row(pool: &PgPool, row: NamespaceTuple) -> Result<Namespace, PostgresError> {
    let (id, organization, name, description, documents, created_at, updated_at) = row;
    let id = decode_id(&id)?;
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT id FROM projects WHERE namespace_id = $1 ORDER BY created_at, id")
            .bind(id.to_string())
            .fetch_all(pool)
            .await?;
    Ok(Namespace {
        id,
        organization: decode_id(&organization)?,
        name,
        description,
        projects: decode_id_column(rows)?,
        documents: decode_ids(&documents)?,
        created_at,
        updated_at,
    })
}

pub async fn create_namespace(pool: &PgPool, namespace: &Namespace) -> Result<(), PostgresError> {
    sqlx::query(
        r#"
        INSERT INTO namespaces (id, organization_id, name, description, documents, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
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

pub async fn get_namespace(pool: &PgPool, id: &Id) -> Result<Option<Namespace>, PostgresError> {
    let sql = format!("SELECT {COLUMNS} FROM namespaces WHERE id = $1");
    let row = sqlx::query_as::<_, NamespaceTuple>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(from_row(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn list_by_organization(
    pool: &PgPool,
    organization: &Id,
    offset: u32,
    limit: u32,
) -> Result<Vec<Namespace>, PostgresError> {
    let (offset, limit) = page(offset, limit);
    let sql = format!(
        "SELECT {COLUMNS} FROM namespaces WHERE organization_id = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3"
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

pub async fn update_namespace(
    pool: &PgPool,
    id: &Id,
    patch: &NamespacePatch,
    updated_at: i64,
) -> Result<Option<Namespace>, PostgresError> {
    let sql = format!(
        r#"
        UPDATE namespaces SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            documents = COALESCE($3, documents),
            updated_at = $4
        WHERE id = $5
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

pub async fn delete_namespace(pool: &PgPool, id: &Id) -> Result<bool, PostgresError> {
    let result = sqlx::query("DELETE FROM namespaces WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
