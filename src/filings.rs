//! Filing locator.
//!
//! Scans the tree written by the EDGAR download tool and yields one
//! [`Filing`] per primary document:
//!
//! ```text
//! <root>/sec-edgar-filings/<TICKER>/<FILING TYPE>/<ACCESSION NUMBER>/primary-document.pdf
//! <root>/sec-edgar-filings/<TICKER>/<FILING TYPE>/<ACCESSION NUMBER>/full-submission.txt
//! ```
//!
//! The SGML header at the top of `full-submission.txt` supplies the CIK and
//! the report dates. Anything that does not fit the layout is skipped with
//! a warning; a bad filing never stops the scan.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::models::{Filing, SecDocumentType};

pub const FILINGS_DIR: &str = "sec-edgar-filings";
pub const PRIMARY_DOCUMENT: &str = "primary-document.pdf";
pub const FULL_SUBMISSION: &str = "full-submission.txt";

const HEADER_END: &str = "</SEC-HEADER>";

/// Lazily walk `root` for filings, in file-name order.
///
/// If `root` has no `sec-edgar-filings` child it is taken to be that
/// directory itself.
pub fn find_filings(root: &Path) -> impl Iterator<Item = Filing> {
    let base = filings_base(root);
    WalkDir::new(base.clone())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && e.file_name() == PRIMARY_DOCUMENT)
        .filter_map(move |e| match parse_filing(&base, e.path()) {
            Ok(filing) => Some(filing),
            Err(err) => {
                warn!(path = %e.path().display(), error = %err, "skipping malformed filing");
                None
            }
        })
}

fn filings_base(root: &Path) -> PathBuf {
    let nested = root.join(FILINGS_DIR);
    if nested.is_dir() {
        nested
    } else {
        root.to_path_buf()
    }
}

/// Build a [`Filing`] from a primary document path below `base`.
pub fn parse_filing(base: &Path, pdf_path: &Path) -> Result<Filing> {
    let relative = pdf_path
        .strip_prefix(base)
        .with_context(|| format!("{} is outside {}", pdf_path.display(), base.display()))?;

    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or(""))
        .collect();
    let [symbol, filing_type, accession_number, _file] = parts.as_slice() else {
        bail!(
            "expected <TICKER>/<TYPE>/<ACCESSION>/{}, got {}",
            PRIMARY_DOCUMENT,
            relative.display()
        );
    };

    let filing_type = SecDocumentType::parse(filing_type)
        .ok_or_else(|| anyhow!("unsupported filing type: {}", filing_type))?;

    let submission = pdf_path.with_file_name(FULL_SUBMISSION);
    let header = read_header(&submission)
        .with_context(|| format!("failed to read {}", submission.display()))?;

    let cik = header
        .get("CENTRAL INDEX KEY")
        .cloned()
        .ok_or_else(|| anyhow!("header has no CENTRAL INDEX KEY"))?;
    let period_of_report_date = header
        .get("CONFORMED PERIOD OF REPORT")
        .ok_or_else(|| anyhow!("header has no CONFORMED PERIOD OF REPORT"))
        .and_then(|s| parse_header_date(s))?;
    let filed_as_of_date = optional_date(&header, "FILED AS OF DATE")?;
    let date_as_of_change = optional_date(&header, "DATE AS OF CHANGE")?;

    let quarter = match filing_type {
        SecDocumentType::TenQ => Some(quarter_of(period_of_report_date)),
        SecDocumentType::TenK => None,
    };

    Ok(Filing {
        symbol: symbol.to_string(),
        filing_type,
        year: period_of_report_date.year(),
        quarter,
        accession_number: accession_number.to_string(),
        cik,
        period_of_report_date,
        filed_as_of_date,
        date_as_of_change,
        file_path: pdf_path.to_path_buf(),
    })
}

/// Read `KEY: value` pairs up to the end of the SGML header. Lines are
/// indented and tab-separated; the first occurrence of a key wins, since
/// filer blocks repeat some keys further down.
fn read_header(path: &Path) -> Result<HashMap<String, String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut fields = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim() == HEADER_END {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim();
            if !key.is_empty() && !value.is_empty() {
                fields
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }

    Ok(fields)
}

fn parse_header_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").with_context(|| format!("bad header date: {}", s))
}

fn optional_date(header: &HashMap<String, String>, key: &str) -> Result<Option<NaiveDate>> {
    header.get(key).map(|s| parse_header_date(s)).transpose()
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}
