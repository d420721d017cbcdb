//! Postgres + pgvector [`Store`] implementation.
//!
//! Expects the schema created by [`crate::migrate`]: a `document` table and
//! a `data_pg_vector_store` table whose rows carry both the historic
//! `metadata_->>'db_document_id'` back-reference and an indexed
//! `document_id` foreign key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::Store;
use crate::models::{
    Document, DocumentVectorStats, NewDocument, VectorEntry, DB_DOCUMENT_ID_KEY,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const DOCUMENT_COLUMNS: &str = "id, url, metadata_map, created_at, updated_at";
const VECTOR_COLUMNS: &str = "id, document_id, node_id, text, metadata_, embedding";

fn document_from_row(row: &PgRow) -> Result<Document> {
    let metadata: Option<Json<serde_json::Value>> = row.try_get("metadata_map")?;
    Ok(Document {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        metadata_map: metadata
            .map(|Json(v)| v)
            .unwrap_or_else(|| serde_json::json!({})),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn vector_from_row(row: &PgRow) -> Result<VectorEntry> {
    let metadata: Option<Json<serde_json::Value>> = row.try_get("metadata_")?;
    let embedding: Option<Vector> = row.try_get("embedding")?;
    let metadata = metadata
        .map(|Json(v)| v)
        .unwrap_or_else(|| serde_json::json!({}));

    // Rows written before the foreign key existed may only carry the
    // metadata back-reference.
    let document_id: Option<Uuid> = row.try_get("document_id")?;
    let document_id = document_id
        .or_else(|| {
            metadata
                .get(DB_DOCUMENT_ID_KEY)
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
        })
        .unwrap_or_else(Uuid::nil);

    Ok(VectorEntry {
        id: row.try_get("id")?,
        document_id,
        node_id: row.try_get("node_id")?,
        text: row.try_get("text")?,
        metadata,
        embedding: embedding.map(|v| v.to_vec()).unwrap_or_default(),
    })
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_document_by_url(&self, doc: &NewDocument) -> Result<Document> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO document (id, url, metadata_map, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            ON CONFLICT (url) DO UPDATE SET
                metadata_map = EXCLUDED.metadata_map,
                updated_at = now()
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&doc.url)
        .bind(Json(&doc.metadata_map))
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("upserting document {}", doc.url))?;

        tx.commit().await?;
        document_from_row(&row)
    }

    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM document ORDER BY created_at ASC, id ASC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn fetch_document(&self, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM document WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn insert_vectors(&self, entries: &[VectorEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO data_pg_vector_store (id, text, metadata_, node_id, embedding, document_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id)
            .bind(&entry.text)
            .bind(Json(&entry.metadata))
            .bind(&entry.node_id)
            .bind(Vector::from(entry.embedding.clone()))
            .bind(entry.document_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting vector row for document {}", entry.document_id))?;
        }
        tx.commit().await?;

        debug!(rows = entries.len(), "inserted vector rows");
        Ok(())
    }

    async fn fetch_vectors(&self, document_id: Uuid) -> Result<Vec<VectorEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM data_pg_vector_store WHERE document_id = $1 \
             ORDER BY (metadata_->>'chunk_index')::bigint NULLS LAST, id",
            VECTOR_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(vector_from_row).collect()
    }

    async fn count_vectors(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data_pg_vector_store")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_vectors_for_document(&self, document_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM data_pg_vector_store WHERE document_id = $1")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn vector_stats(&self) -> Result<Vec<DocumentVectorStats>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id AS document_id,
                   d.url,
                   COUNT(v.id) AS vector_count,
                   MIN(v.text) AS sample_text
            FROM document d
            LEFT JOIN data_pg_vector_store v ON v.document_id = d.id
            GROUP BY d.id, d.url
            ORDER BY COUNT(v.id) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DocumentVectorStats {
                    document_id: row.try_get("document_id")?,
                    url: row.try_get("url")?,
                    vector_count: row.try_get("vector_count")?,
                    sample_text: row.try_get("sample_text")?,
                })
            })
            .collect()
    }

    async fn sample_vectors(&self, limit: i64) -> Result<Vec<VectorEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM data_pg_vector_store LIMIT $1",
            VECTOR_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(vector_from_row).collect()
    }
}
