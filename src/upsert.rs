//! Document upserter.
//!
//! Turns located [`Filing`]s into `document` rows. A row's identity is its
//! URL: re-running over an unchanged tree replaces metadata in place and
//! never adds rows.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{Filing, NewDocument, SecDocumentMetadata, SEC_DOCUMENT_KEY};
use crate::stocks::{Stock, StockDirectory};
use crate::store::Store;

/// Default public base URL for filing PDFs.
pub const DEFAULT_URL_BASE: &str = "https://dl94gqvzlh4k8.cloudfront.net";

/// Maps a filing's local path to the URL its document is stored under.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: String,
    doc_root: PathBuf,
    uploaded: HashMap<PathBuf, String>,
}

impl UrlResolver {
    pub fn new(base_url: &str, doc_root: &Path) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            doc_root: doc_root.to_path_buf(),
            uploaded: HashMap::new(),
        }
    }

    /// URLs for files already uploaded elsewhere, keyed by local path.
    /// These take precedence over `base_url`.
    pub fn with_uploaded(mut self, uploaded: HashMap<PathBuf, String>) -> Self {
        self.uploaded = uploaded;
        self
    }

    pub fn resolve(&self, file_path: &Path) -> String {
        if let Some(url) = self.uploaded.get(file_path) {
            return url.clone();
        }
        let relative = file_path.strip_prefix(&self.doc_root).unwrap_or(file_path);
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.base_url, relative.trim_start_matches('/'))
    }
}

/// Parse `path=url` pairs separated by commas.
pub fn parse_uploaded(pairs: &str) -> Result<HashMap<PathBuf, String>> {
    let mut map = HashMap::new();
    for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((path, url)) = pair.split_once('=') else {
            bail!("expected path=url, got '{}'", pair);
        };
        let (path, url) = (path.trim(), url.trim());
        if path.is_empty() || url.is_empty() {
            bail!("expected path=url, got '{}'", pair);
        }
        map.insert(PathBuf::from(path), url.to_string());
    }
    Ok(map)
}

pub fn sec_metadata(stock: &Stock, filing: &Filing) -> SecDocumentMetadata {
    SecDocumentMetadata {
        company_name: stock.name.clone(),
        company_ticker: stock.symbol.clone(),
        doc_type: filing.filing_type,
        year: filing.year,
        quarter: filing.quarter,
        accession_number: filing.accession_number.clone(),
        cik: filing.cik.clone(),
        period_of_report_date: Some(filing.period_of_report_date),
        filed_as_of_date: filing.filed_as_of_date,
        date_as_of_change: filing.date_as_of_change,
    }
}

pub fn build_document(stock: &Stock, filing: &Filing, urls: &UrlResolver) -> Result<NewDocument> {
    let meta = serde_json::to_value(sec_metadata(stock, filing))?;
    Ok(NewDocument {
        url: urls.resolve(&filing.file_path),
        metadata_map: serde_json::json!({ SEC_DOCUMENT_KEY: meta }),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub upserted: usize,
    pub skipped: usize,
}

/// Upsert one document per filing whose ticker is known.
///
/// Unknown tickers are logged and counted as skipped. A store error stops
/// the run; documents upserted before it stay committed.
pub async fn upsert_documents_from_filings(
    store: &dyn Store,
    filings: &[Filing],
    stocks: &StockDirectory,
    urls: &UrlResolver,
) -> Result<UpsertSummary> {
    let mut summary = UpsertSummary::default();

    for filing in filings {
        let Some(stock) = stocks.lookup(&filing.symbol) else {
            warn!(symbol = %filing.symbol, "symbol not in stock table, skipping");
            summary.skipped += 1;
            continue;
        };

        let doc = build_document(stock, filing, urls)?;
        let stored = store.upsert_document_by_url(&doc).await?;
        info!(id = %stored.id, url = %stored.url, "upserted document");
        summary.upserted += 1;
    }

    Ok(summary)
}
