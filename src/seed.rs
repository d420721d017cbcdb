//! Storage context seeder.
//!
//! Indexes every stored document into the vector table: load its text,
//! chunk it, embed each chunk, then write all of the document's vector
//! rows in one transaction. Documents are processed one at a time and the
//! run stops at the first failure.
//!
//! In [`SeedMode::Legacy`] every run indexes every document again, so
//! repeated runs duplicate vector rows. [`SeedMode::SkipIndexed`] leaves
//! documents that already own vector rows alone.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::llm::Embedder;
use crate::loader::DocumentLoader;
use crate::models::{Document, VectorEntry, DB_DOCUMENT_ID_KEY, SEC_DOCUMENT_KEY};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedMode {
    #[default]
    Legacy,
    SkipIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    pub mode: SeedMode,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub documents: usize,
    pub skipped: usize,
    pub vectors: usize,
}

pub async fn seed_storage_context(
    store: &dyn Store,
    loader: &dyn DocumentLoader,
    embedder: &dyn Embedder,
    options: SeedOptions,
) -> Result<SeedSummary> {
    let docs = store.fetch_documents().await?;
    info!(count = docs.len(), mode = ?options.mode, "seeding storage context");

    let mut summary = SeedSummary::default();
    for doc in &docs {
        if options.mode == SeedMode::SkipIndexed
            && store.count_vectors_for_document(doc.id).await? > 0
        {
            info!(id = %doc.id, "already indexed, skipping");
            summary.skipped += 1;
            continue;
        }

        match index_document(store, loader, embedder, doc, options.max_tokens).await {
            Ok(n) => {
                info!(id = %doc.id, vectors = n, "indexed document");
                summary.documents += 1;
                summary.vectors += n;
            }
            Err(e) => {
                error!(id = %doc.id, url = %doc.url, error = %e, "failed to index document");
                return Err(e);
            }
        }
    }

    Ok(summary)
}

/// Index one document. Returns the number of vector rows written.
pub async fn index_document(
    store: &dyn Store,
    loader: &dyn DocumentLoader,
    embedder: &dyn Embedder,
    doc: &Document,
    max_tokens: usize,
) -> Result<usize> {
    let text = loader.load(&doc.url).await?;
    // A chunk must fit the embedding model's context window.
    let budget = max_tokens.min(embedder.metadata().context_window);
    let chunks = chunk_text(&text, budget);

    let mut entries = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let embedding = embedder
            .embed_one(&chunk.text)
            .await
            .with_context(|| format!("embedding chunk {} of {}", chunk.index, doc.id))?;

        let mut metadata = json!({
            DB_DOCUMENT_ID_KEY: doc.id.to_string(),
            "chunk_index": chunk.index,
        });
        if let Some(sec) = doc.metadata_map.get(SEC_DOCUMENT_KEY) {
            metadata[SEC_DOCUMENT_KEY] = sec.clone();
        }

        entries.push(VectorEntry {
            id: Uuid::new_v4(),
            document_id: doc.id,
            node_id: Uuid::new_v4().to_string(),
            text: chunk.text,
            metadata,
            embedding,
        });
    }

    store.insert_vectors(&entries).await?;
    Ok(entries.len())
}
