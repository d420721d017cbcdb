//! Storage abstraction.
//!
//! The [`Store`] trait covers every read and write the pipeline and the
//! HTTP API perform against the `document` and `data_pg_vector_store`
//! tables. [`postgres::PgStore`] is the production backend;
//! [`memory::InMemoryStore`] backs tests and dry runs.
//!
//! Each write method is its own unit of work: backends commit it as a
//! single transaction or not at all.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Document, DocumentVectorStats, NewDocument, VectorEntry};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document_by_url`](Store::upsert_document_by_url) | Insert or replace metadata, keyed by URL |
/// | [`fetch_documents`](Store::fetch_documents) | All documents, oldest first |
/// | [`fetch_document`](Store::fetch_document) | One document by id |
/// | [`insert_vectors`](Store::insert_vectors) | Append vector rows |
/// | [`fetch_vectors`](Store::fetch_vectors) | Vector rows owned by a document |
/// | [`count_vectors`](Store::count_vectors) | Total vector rows |
/// | [`count_vectors_for_document`](Store::count_vectors_for_document) | Vector rows owned by a document |
/// | [`vector_stats`](Store::vector_stats) | Per-document vector counts |
/// | [`sample_vectors`](Store::sample_vectors) | First few vector rows, for diagnostics |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a document, or replace the metadata of the one with the same
    /// URL. Returns the stored row; an existing row keeps its id.
    async fn upsert_document_by_url(&self, doc: &NewDocument) -> Result<Document>;

    async fn fetch_documents(&self) -> Result<Vec<Document>>;

    async fn fetch_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Append vector rows. Rows are never deduplicated.
    async fn insert_vectors(&self, entries: &[VectorEntry]) -> Result<()>;

    async fn fetch_vectors(&self, document_id: Uuid) -> Result<Vec<VectorEntry>>;

    async fn count_vectors(&self) -> Result<i64>;

    async fn count_vectors_for_document(&self, document_id: Uuid) -> Result<i64>;

    /// One entry per document, most vectors first.
    async fn vector_stats(&self) -> Result<Vec<DocumentVectorStats>>;

    async fn sample_vectors(&self, limit: i64) -> Result<Vec<VectorEntry>>;
}
