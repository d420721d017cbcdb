//! Seeder behavior with a stub loader and embedder.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sec_insights::llm::{Embedder, LlmError, LlmMetadata, LlmResult};
use sec_insights::loader::DocumentLoader;
use sec_insights::models::{NewDocument, DB_DOCUMENT_ID_KEY, SEC_DOCUMENT_KEY};
use sec_insights::seed::{seed_storage_context, SeedMode, SeedOptions};
use sec_insights::store::memory::InMemoryStore;
use sec_insights::store::Store;
use serde_json::json;

const DIMS: usize = 8;

/// Serves fixed text per URL; unknown URLs fail.
struct StubLoader;

#[async_trait]
impl DocumentLoader for StubLoader {
    async fn load(&self, url: &str) -> Result<String> {
        match url {
            "https://x/a.pdf" => Ok("Revenue grew.\n\nMargins fell.\n\nOutlook unchanged.".to_string()),
            "https://x/b.pdf" => Ok("Risk factors.".to_string()),
            "https://x/empty.pdf" => Ok(String::new()),
            "https://x/long.pdf" => Ok("word ".repeat(2000)),
            _ => bail!("no such document: {}", url),
        }
    }
}

/// Returns vectors whose length depends on the input, so fitting is
/// exercised in both directions.
struct RaggedEmbedder {
    metadata: LlmMetadata,
    fail_on: Option<&'static str>,
}

impl RaggedEmbedder {
    fn new() -> Self {
        Self {
            metadata: LlmMetadata {
                model_name: "ragged".to_string(),
                context_window: 4096,
                num_output: 1024,
            },
            fail_on: None,
        }
    }
}

#[async_trait]
impl Embedder for RaggedEmbedder {
    fn metadata(&self) -> &LlmMetadata {
        &self.metadata
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn request_embedding(&self, text: &str) -> LlmResult<Vec<f32>> {
        if self.fail_on.is_some_and(|needle| text.contains(needle)) {
            return Err(LlmError::InvalidResponse {
                provider: "stub",
                message: "boom".to_string(),
            });
        }
        Ok(vec![1.0; text.len()])
    }
}

async fn store_with(urls: &[&str]) -> InMemoryStore {
    let store = InMemoryStore::new();
    for url in urls {
        store
            .upsert_document_by_url(&NewDocument {
                url: url.to_string(),
                metadata_map: json!({ SEC_DOCUMENT_KEY: { "company_ticker": "AAPL" } }),
            })
            .await
            .unwrap();
    }
    store
}

fn options(mode: SeedMode) -> SeedOptions {
    SeedOptions {
        mode,
        max_tokens: 4,
    }
}

#[tokio::test]
async fn every_stored_embedding_has_configured_width() {
    let store = store_with(&["https://x/a.pdf", "https://x/b.pdf"]).await;
    let summary = seed_storage_context(
        &store,
        &StubLoader,
        &RaggedEmbedder::new(),
        options(SeedMode::Legacy),
    )
    .await
    .unwrap();

    assert_eq!(summary.documents, 2);
    assert!(summary.vectors >= 3);

    for doc in store.fetch_documents().await.unwrap() {
        let vectors = store.fetch_vectors(doc.id).await.unwrap();
        assert!(!vectors.is_empty());
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v.embedding.len(), DIMS);
            assert_eq!(v.document_id, doc.id);
            assert_eq!(v.metadata[DB_DOCUMENT_ID_KEY], doc.id.to_string());
            assert_eq!(v.metadata["chunk_index"], i as i64);
            assert_eq!(v.metadata[SEC_DOCUMENT_KEY]["company_ticker"], "AAPL");
            assert!(v.metadata.get("chunk_hash").is_none());
        }
    }
}

#[tokio::test]
async fn legacy_mode_duplicates_rows_on_rerun() {
    let store = store_with(&["https://x/a.pdf"]).await;
    let embedder = RaggedEmbedder::new();

    seed_storage_context(&store, &StubLoader, &embedder, options(SeedMode::Legacy))
        .await
        .unwrap();
    let first = store.count_vectors().await.unwrap();

    seed_storage_context(&store, &StubLoader, &embedder, options(SeedMode::Legacy))
        .await
        .unwrap();
    let second = store.count_vectors().await.unwrap();

    assert!(first > 0);
    assert_eq!(second, first * 2);
}

#[tokio::test]
async fn skip_indexed_mode_is_rerun_safe() {
    let store = store_with(&["https://x/a.pdf"]).await;
    let embedder = RaggedEmbedder::new();

    seed_storage_context(&store, &StubLoader, &embedder, options(SeedMode::SkipIndexed))
        .await
        .unwrap();
    let first = store.count_vectors().await.unwrap();

    store
        .upsert_document_by_url(&NewDocument {
            url: "https://x/b.pdf".to_string(),
            metadata_map: json!({}),
        })
        .await
        .unwrap();
    let summary =
        seed_storage_context(&store, &StubLoader, &embedder, options(SeedMode::SkipIndexed))
            .await
            .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.documents, 1);
    assert_eq!(store.count_vectors().await.unwrap(), first + 1);
}

#[tokio::test]
async fn empty_document_writes_no_rows() {
    let store = store_with(&["https://x/empty.pdf"]).await;
    let summary = seed_storage_context(
        &store,
        &StubLoader,
        &RaggedEmbedder::new(),
        options(SeedMode::Legacy),
    )
    .await
    .unwrap();

    assert_eq!(summary.documents, 1);
    assert_eq!(summary.vectors, 0);
    assert_eq!(store.count_vectors().await.unwrap(), 0);
}

#[tokio::test]
async fn load_failure_aborts_run() {
    let store = store_with(&["https://x/a.pdf", "https://x/missing.pdf", "https://x/b.pdf"]).await;
    let result = seed_storage_context(
        &store,
        &StubLoader,
        &RaggedEmbedder::new(),
        options(SeedMode::Legacy),
    )
    .await;

    assert!(result.is_err());
    let docs = store.fetch_documents().await.unwrap();
    assert!(store.count_vectors_for_document(docs[0].id).await.unwrap() > 0);
    assert_eq!(store.count_vectors_for_document(docs[2].id).await.unwrap(), 0);
}

#[tokio::test]
async fn embedding_failure_writes_nothing_for_that_document() {
    let store = store_with(&["https://x/a.pdf"]).await;
    let embedder = RaggedEmbedder {
        fail_on: Some("Outlook"),
        ..RaggedEmbedder::new()
    };

    let err = seed_storage_context(&store, &StubLoader, &embedder, options(SeedMode::Legacy))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("embedding chunk"));
    assert_eq!(store.count_vectors().await.unwrap(), 0);
}

#[tokio::test]
async fn chunks_fit_embedder_context_window() {
    let store = store_with(&["https://x/long.pdf"]).await;
    let mut embedder = RaggedEmbedder::new();
    embedder.metadata.context_window = 16;

    let summary = seed_storage_context(
        &store,
        &StubLoader,
        &embedder,
        SeedOptions {
            mode: SeedMode::Legacy,
            max_tokens: 10_000,
        },
    )
    .await
    .unwrap();

    assert!(summary.vectors > 1);
    let doc = &store.fetch_documents().await.unwrap()[0];
    for v in store.fetch_vectors(doc.id).await.unwrap() {
        assert!(v.text.len() <= 16 * 4, "chunk of {} chars", v.text.len());
    }
}
