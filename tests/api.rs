//! HTTP API tests against a live server on an ephemeral port.

use sec_insights::models::NewDocument;
use sec_insights::server::router;
use sec_insights::store::memory::InMemoryStore;
use sec_insights::store::Store;
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn(store: Arc<InMemoryStore>) -> String {
    let app = router(store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn list_documents_on_empty_store_is_empty_array() {
    let base = spawn(Arc::new(InMemoryStore::new())).await;

    let resp = reqwest::get(format!("{}/documents", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn list_and_fetch_documents() {
    let store = Arc::new(InMemoryStore::new());
    let doc = store
        .upsert_document_by_url(&NewDocument {
            url: "https://cdn.example.com/aapl.pdf".to_string(),
            metadata_map: json!({ "sec_document": { "company_ticker": "AAPL" } }),
        })
        .await
        .unwrap();
    let base = spawn(store).await;

    let list: Value = reqwest::get(format!("{}/documents", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], doc.id.to_string());

    let resp = reqwest::get(format!("{}/documents/{}", base, doc.id))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let one: Value = resp.json().await.unwrap();
    assert_eq!(one["url"], "https://cdn.example.com/aapl.pdf");
    assert_eq!(one["metadata_map"]["sec_document"]["company_ticker"], "AAPL");
}

#[tokio::test]
async fn unknown_document_is_404() {
    let base = spawn(Arc::new(InMemoryStore::new())).await;

    let resp = reqwest::get(format!("{}/documents/{}", base, uuid::Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "detail": "Document not found" }));
}

#[tokio::test]
async fn malformed_id_is_400() {
    let base = spawn(Arc::new(InMemoryStore::new())).await;

    let resp = reqwest::get(format!("{}/documents/not-a-uuid", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("not-a-uuid"));
}

#[tokio::test]
async fn health_reports_version() {
    let base = spawn(Arc::new(InMemoryStore::new())).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
