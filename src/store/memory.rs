//! In-memory [`Store`] implementation for tests.
//!
//! Documents and vectors live in `Vec`s behind `std::sync::RwLock`, kept in
//! insertion order so listings are deterministic.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::Store;
use crate::models::{Document, DocumentVectorStats, NewDocument, VectorEntry};

/// In-memory store with the same upsert and append semantics as Postgres.
pub struct InMemoryStore {
    docs: RwLock<Vec<Document>>,
    vectors: RwLock<Vec<VectorEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            vectors: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_document_by_url(&self, doc: &NewDocument) -> Result<Document> {
        let mut docs = self.docs.write().unwrap();
        let now = Utc::now();
        if let Some(existing) = docs.iter_mut().find(|d| d.url == doc.url) {
            existing.metadata_map = doc.metadata_map.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let stored = Document {
            id: Uuid::new_v4(),
            url: doc.url.clone(),
            metadata_map: doc.metadata_map.clone(),
            created_at: now,
            updated_at: now,
        };
        docs.push(stored.clone());
        Ok(stored)
    }

    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        Ok(self.docs.read().unwrap().clone())
    }

    async fn fetch_document(&self, id: Uuid) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_vectors(&self, entries: &[VectorEntry]) -> Result<()> {
        let mut vectors = self.vectors.write().unwrap();
        vectors.extend_from_slice(entries);
        Ok(())
    }

    async fn fetch_vectors(&self, document_id: Uuid) -> Result<Vec<VectorEntry>> {
        let vectors = self.vectors.read().unwrap();
        Ok(vectors
            .iter()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn count_vectors(&self) -> Result<i64> {
        Ok(self.vectors.read().unwrap().len() as i64)
    }

    async fn count_vectors_for_document(&self, document_id: Uuid) -> Result<i64> {
        let vectors = self.vectors.read().unwrap();
        Ok(vectors
            .iter()
            .filter(|v| v.document_id == document_id)
            .count() as i64)
    }

    async fn vector_stats(&self) -> Result<Vec<DocumentVectorStats>> {
        let docs = self.docs.read().unwrap();
        let vectors = self.vectors.read().unwrap();
        let mut stats: Vec<DocumentVectorStats> = docs
            .iter()
            .map(|d| {
                let owned: Vec<&VectorEntry> =
                    vectors.iter().filter(|v| v.document_id == d.id).collect();
                DocumentVectorStats {
                    document_id: d.id,
                    url: d.url.clone(),
                    vector_count: owned.len() as i64,
                    sample_text: owned.iter().map(|v| v.text.clone()).min(),
                }
            })
            .collect();
        stats.sort_by(|a, b| b.vector_count.cmp(&a.vector_count));
        Ok(stats)
    }

    async fn sample_vectors(&self, limit: i64) -> Result<Vec<VectorEntry>> {
        let vectors = self.vectors.read().unwrap();
        Ok(vectors
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
