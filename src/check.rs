//! Database diagnostics.
//!
//! Answers "did seeding work?": how many documents and vector rows exist,
//! how the rows are spread over documents, and, when none are attached to
//! any document, a few of the unattached rows so the back-reference can be
//! inspected by hand.

use anyhow::Result;

use crate::models::{DocumentVectorStats, VectorEntry, DB_DOCUMENT_ID_KEY};
use crate::store::Store;

const ORPHAN_SAMPLE: i64 = 5;
const SAMPLE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub documents: usize,
    pub vectors: i64,
    pub per_document: Vec<DocumentVectorStats>,
    /// Only filled when vector rows exist but none belong to a document.
    pub orphans: Vec<VectorEntry>,
}

impl CheckReport {
    pub fn attached_vectors(&self) -> i64 {
        self.per_document.iter().map(|s| s.vector_count).sum()
    }
}

pub async fn check_store(store: &dyn Store) -> Result<CheckReport> {
    let documents = store.fetch_documents().await?.len();
    let vectors = store.count_vectors().await?;
    let per_document = store.vector_stats().await?;

    let mut report = CheckReport {
        documents,
        vectors,
        per_document,
        orphans: Vec::new(),
    };
    if report.vectors > 0 && report.attached_vectors() == 0 {
        report.orphans = store.sample_vectors(ORPHAN_SAMPLE).await?;
    }
    Ok(report)
}

pub fn print_report(report: &CheckReport) {
    println!("Documents:    {}", report.documents);
    println!("Vector rows:  {}", report.vectors);
    println!();

    for s in &report.per_document {
        println!("  {}  {} vectors  {}", s.document_id, s.vector_count, s.url);
        if let Some(text) = &s.sample_text {
            println!("      sample: {}", preview(text));
        }
    }

    if !report.orphans.is_empty() {
        println!();
        println!("No vector rows are attached to a document. First rows:");
        for v in &report.orphans {
            let back_ref = v
                .metadata
                .get(DB_DOCUMENT_ID_KEY)
                .and_then(|id| id.as_str())
                .unwrap_or("-");
            println!("  {}  {}={}  {}", v.id, DB_DOCUMENT_ID_KEY, back_ref, preview(&v.text));
        }
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > SAMPLE_CHARS {
        format!("{}...", flat.chars().take(SAMPLE_CHARS).collect::<String>())
    } else {
        flat
    }
}
