//! Filing tree → document rows, end to end against the in-memory store.

use sec_insights::filings::{find_filings, FILINGS_DIR, FULL_SUBMISSION, PRIMARY_DOCUMENT};
use sec_insights::models::{Filing, SEC_DOCUMENT_KEY};
use sec_insights::stocks::StockDirectory;
use sec_insights::store::memory::InMemoryStore;
use sec_insights::store::Store;
use sec_insights::upsert::{upsert_documents_from_filings, UrlResolver};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn header(period: &str) -> String {
    format!(
        "<SEC-HEADER>\nCONFORMED PERIOD OF REPORT:\t{}\nFILED AS OF DATE:\t\t20201030\n\
         \tCENTRAL INDEX KEY:\t\t\t0000320193\n</SEC-HEADER>\n",
        period
    )
}

fn write_filing(root: &Path, symbol: &str, kind: &str, accession: &str, period: &str) {
    let dir = root.join(FILINGS_DIR).join(symbol).join(kind).join(accession);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(PRIMARY_DOCUMENT), b"%PDF-1.4").unwrap();
    fs::write(dir.join(FULL_SUBMISSION), header(period)).unwrap();
}

fn filing_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_filing(tmp.path(), "AAPL", "10-K", "0000320193-20-000096", "20200926");
    write_filing(tmp.path(), "AAPL", "10-Q", "0000320193-21-000065", "20210626");
    write_filing(tmp.path(), "NOPE", "10-K", "0000000000-20-000001", "20201231");
    tmp
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let tmp = filing_tree();
    let store = InMemoryStore::new();
    let stocks = StockDirectory::builtin().unwrap();
    let urls = UrlResolver::new("https://cdn.example.com", tmp.path());
    let filings: Vec<Filing> = find_filings(tmp.path()).collect();

    let first = upsert_documents_from_filings(&store, &filings, &stocks, &urls)
        .await
        .unwrap();
    let docs_after_first = store.fetch_documents().await.unwrap();

    let second = upsert_documents_from_filings(&store, &filings, &stocks, &urls)
        .await
        .unwrap();
    let docs_after_second = store.fetch_documents().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(docs_after_first.len(), docs_after_second.len());
    for (a, b) in docs_after_first.iter().zip(&docs_after_second) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.url, b.url);
        assert_eq!(a.metadata_map, b.metadata_map);
    }
}

#[tokio::test]
async fn same_ticker_different_accessions_are_distinct_documents() {
    let tmp = filing_tree();
    let store = InMemoryStore::new();
    let stocks = StockDirectory::builtin().unwrap();
    let urls = UrlResolver::new("https://cdn.example.com", tmp.path());
    let filings: Vec<Filing> = find_filings(tmp.path()).collect();

    let summary = upsert_documents_from_filings(&store, &filings, &stocks, &urls)
        .await
        .unwrap();
    assert_eq!(summary.upserted, 2);
    assert_eq!(summary.skipped, 1);

    let docs = store.fetch_documents().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_ne!(docs[0].url, docs[1].url);

    let urls: Vec<&str> = docs.iter().map(|d| d.url.as_str()).collect();
    assert!(urls.contains(
        &"https://cdn.example.com/sec-edgar-filings/AAPL/10-K/0000320193-20-000096/primary-document.pdf"
    ));

    let quarterly = docs
        .iter()
        .find(|d| d.url.contains("/10-Q/"))
        .unwrap()
        .sec_metadata()
        .unwrap();
    assert_eq!(quarterly.company_name, "Apple Inc.");
    assert_eq!(quarterly.quarter, Some(2));
    assert_eq!(quarterly.year, 2021);
}

#[tokio::test]
async fn uploaded_urls_replace_generated_ones() {
    let tmp = filing_tree();
    let store = InMemoryStore::new();
    let stocks = StockDirectory::builtin().unwrap();
    let filings: Vec<Filing> = find_filings(tmp.path()).collect();

    let annual = filings
        .iter()
        .find(|f| f.accession_number == "0000320193-20-000096")
        .unwrap();
    let mut uploaded = HashMap::new();
    uploaded.insert(
        annual.file_path.clone(),
        "http://localhost:4566/sec-insights-assets-local/aapl-10k.pdf".to_string(),
    );
    let urls = UrlResolver::new("https://cdn.example.com", tmp.path()).with_uploaded(uploaded);

    upsert_documents_from_filings(&store, &filings, &stocks, &urls)
        .await
        .unwrap();

    let docs = store.fetch_documents().await.unwrap();
    let uploaded_doc = docs
        .iter()
        .find(|d| d.url == "http://localhost:4566/sec-insights-assets-local/aapl-10k.pdf")
        .unwrap();
    assert_eq!(
        uploaded_doc.metadata_map[SEC_DOCUMENT_KEY]["accession_number"],
        "0000320193-20-000096"
    );
}

#[tokio::test]
async fn changed_metadata_is_replaced_in_place() {
    let tmp = filing_tree();
    let store = InMemoryStore::new();
    let urls = UrlResolver::new("https://cdn.example.com", tmp.path());
    let filings: Vec<Filing> = find_filings(tmp.path()).collect();

    let old_names = StockDirectory::from_json(r#"[{"symbol":"AAPL","name":"Apple Computer"}]"#)
        .unwrap();
    upsert_documents_from_filings(&store, &filings, &old_names, &urls)
        .await
        .unwrap();
    let before = store.fetch_documents().await.unwrap();

    let stocks = StockDirectory::builtin().unwrap();
    upsert_documents_from_filings(&store, &filings, &stocks, &urls)
        .await
        .unwrap();
    let after = store.fetch_documents().await.unwrap();

    assert_eq!(before.len(), after.len());
    assert_eq!(before[0].id, after[0].id);
    assert_eq!(before[0].created_at, after[0].created_at);
    assert_eq!(after[0].sec_metadata().unwrap().company_name, "Apple Inc.");
}
