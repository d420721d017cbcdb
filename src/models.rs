//! Core data models.
//!
//! [`Filing`]s are parsed from the download directory and never stored;
//! they become [`Document`] rows, whose content is chunked into
//! [`VectorEntry`] rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Key of the SEC filing object inside a document's metadata map.
pub const SEC_DOCUMENT_KEY: &str = "sec_document";

/// Key inside a vector row's metadata that points back at its document.
pub const DB_DOCUMENT_ID_KEY: &str = "db_document_id";

/// SEC form type. Only annual and quarterly reports are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecDocumentType {
    #[serde(rename = "10-K")]
    TenK,
    #[serde(rename = "10-Q")]
    TenQ,
}

impl SecDocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecDocumentType::TenK => "10-K",
            SecDocumentType::TenQ => "10-Q",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "10-K" => Some(SecDocumentType::TenK),
            "10-Q" => Some(SecDocumentType::TenQ),
            _ => None,
        }
    }
}

impl fmt::Display for SecDocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `sec_document` object stored in a document's metadata map.
///
/// Absent optional fields are omitted from the JSON rather than written as
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecDocumentMetadata {
    pub company_name: String,
    pub company_ticker: String,
    pub doc_type: SecDocumentType,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u32>,
    pub accession_number: String,
    pub cik: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_of_report_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filed_as_of_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_as_of_change: Option<NaiveDate>,
}

/// A stored document row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub url: String,
    pub metadata_map: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// The SEC filing metadata, if the map carries a well-formed one.
    pub fn sec_metadata(&self) -> Option<SecDocumentMetadata> {
        self.metadata_map
            .get(SEC_DOCUMENT_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Input to an upsert: everything but the generated fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub url: String,
    pub metadata_map: serde_json::Value,
}

/// One embedded chunk of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: Uuid,
    pub document_id: Uuid,
    pub node_id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// A filing found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Filing {
    pub symbol: String,
    pub filing_type: SecDocumentType,
    pub year: i32,
    pub quarter: Option<u32>,
    pub accession_number: String,
    pub cik: String,
    pub period_of_report_date: NaiveDate,
    pub filed_as_of_date: Option<NaiveDate>,
    pub date_as_of_change: Option<NaiveDate>,
    pub file_path: PathBuf,
}

/// Per-document vector counts, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentVectorStats {
    pub document_id: Uuid,
    pub url: String,
    pub vector_count: i64,
    pub sample_text: Option<String>,
}
