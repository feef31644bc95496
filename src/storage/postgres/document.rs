//! Document operations on `PostgreSQL`.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use super::PostgresStorage;
use super::sql::{self, PRIMARY};
use crate::domain::document::{CREATED_AT_FIELD, DELETED_AT_FIELD, document_id};
use crate::domain::{Document, Filter, QuerySpec};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::DocumentStorage;

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn unwrap_bodies(rows: Vec<Json<Document>>) -> Vec<Document> {
    rows.into_iter().map(|Json(document)| document).collect()
}

fn filtered(select: &str, collection: &str, filter: &Filter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(select);
    builder.push(" FROM documents ");
    builder.push(PRIMARY);
    builder.push(" WHERE ");
    builder.push(PRIMARY);
    builder.push(".collection = ");
    builder.push_bind(collection.to_string());
    sql::push_filter(&mut builder, filter);
    builder
}

#[async_trait]
impl DocumentStorage for PostgresStorage {
    async fn insert(&self, collection: &str, document: Document) -> StorageResult<Document> {
        let id = document_id(&document)
            .ok_or_else(|| StorageError::Serialization("document has no _id".to_string()))?
            .to_string();

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(&document))
            .execute(&self.pool)
            .await?;

        Ok(document)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let row: Option<Json<Document>> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|Json(document)| document))
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> StorageResult<Option<Document>> {
        let row: Option<Json<Document>> = sqlx::query_scalar(
            "UPDATE documents SET body = body || $3 WHERE collection = $1 AND id = $2 RETURNING body",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(document)| document))
    }

    async fn find(&self, query: &QuerySpec) -> StorageResult<Vec<Document>> {
        let mut builder = filtered("SELECT d.body", &query.collection, &query.filter);
        sql::push_order(&mut builder, &query.sort);
        builder.push(" OFFSET ");
        builder.push_bind(clamp(query.page.offset()));
        builder.push(" LIMIT ");
        builder.push_bind(clamp(query.page.limit));

        let rows: Vec<Json<Document>> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(unwrap_bodies(rows)
            .into_iter()
            .map(|document| query.projection.apply(document))
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64> {
        let mut builder = filtered("SELECT COUNT(*)", collection, filter);
        let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> StorageResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Json<Document>> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 AND id = ANY($2)")
                .bind(collection)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(unwrap_bodies(rows))
    }

    async fn search(
        &self,
        collection: &str,
        keyword: &str,
        fields: &[String],
        limit: u64,
    ) -> StorageResult<Vec<Document>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = sql::like_pattern(keyword);
        let mut builder = filtered("SELECT d.body", collection, &Filter::default());

        builder.push(" AND (d.body -> ");
        builder.push_bind(DELETED_AT_FIELD);
        builder.push(" IS NULL OR d.body -> ");
        builder.push_bind(DELETED_AT_FIELD);
        builder.push(" = 'null'::jsonb) AND (");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push("(jsonb_typeof(d.body -> ");
            builder.push_bind(field.clone());
            builder.push(") = 'string' AND d.body ->> ");
            builder.push_bind(field.clone());
            builder.push(" ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(")");
        }
        builder.push(") ORDER BY d.body -> ");
        builder.push_bind(CREATED_AT_FIELD);
        builder.push(" DESC, d.id ASC LIMIT ");
        builder.push_bind(clamp(limit));

        let rows: Vec<Json<Document>> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(unwrap_bodies(rows))
    }
}
