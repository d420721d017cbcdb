//! Document loading.
//!
//! A [`DocumentLoader`] turns a document URL into plain text for the
//! chunker. [`UrlLoader`] understands `http(s)://` URLs, `file://` URLs and
//! bare local paths; PDF bodies (detected by their `%PDF` magic bytes) go
//! through `pdf-extract`, anything else is decoded as UTF-8.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

const PDF_MAGIC: &[u8] = b"%PDF";

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<String>;
}

pub struct UrlLoader {
    client: reqwest::Client,
}

impl UrlLoader {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("failed to fetch {}", url))?;
            let status = resp.status();
            if !status.is_success() {
                bail!("fetching {} returned {}", url, status);
            }
            return Ok(resp.bytes().await?.to_vec());
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read(Path::new(path))
            .await
            .with_context(|| format!("failed to read {}", path))
    }
}

#[async_trait]
impl DocumentLoader for UrlLoader {
    async fn load(&self, url: &str) -> Result<String> {
        let bytes = self.fetch(url).await?;
        let text = tokio::task::spawn_blocking(move || bytes_to_text(&bytes))
            .await
            .context("text extraction task panicked")?;
        text.with_context(|| format!("failed to extract text from {}", url))
    }
}

/// Extract text from a fetched body.
pub fn bytes_to_text(bytes: &[u8]) -> Result<String> {
    if bytes.starts_with(PDF_MAGIC) {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;
        return Ok(text);
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(bytes_to_text(b"Net sales rose.").unwrap(), "Net sales rose.");
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        assert!(bytes_to_text(b"%PDF-1.7 truncated").is_err());
    }

    #[tokio::test]
    async fn test_loads_local_path_and_file_url() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, "Risk factors\n\nCompetition").unwrap();

        let loader = UrlLoader::new(5).unwrap();
        let direct = loader.load(path.to_str().unwrap()).await.unwrap();
        let via_url = loader
            .load(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(direct, "Risk factors\n\nCompetition");
        assert_eq!(direct, via_url);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let loader = UrlLoader::new(5).unwrap();
        assert!(loader.load("/definitely/not/here.pdf").await.is_err());
    }
}
