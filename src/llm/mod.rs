//! Embedding and completion providers.
//!
//! Two capability traits, [`Embedder`] and [`Completer`], with one
//! implementation per provider:
//! - **[`ollama`]**: a local Ollama instance (`/api/embeddings`, `/api/generate`).
//! - **[`openai`]**: the OpenAI API (`/v1/embeddings`, `/v1/chat/completions`).
//!
//! The provider is picked once at startup by [`create_embedder`] /
//! [`create_completer`] from the typed [`LlmProvider`] setting.
//!
//! # Failure semantics
//!
//! A non-2xx status or a network error is returned to the caller as an
//! [`LlmError`]. There is no retry: callers decide whether to abort.
//!
//! # Dimension fitting
//!
//! [`Embedder::embed_one`] always returns exactly [`Embedder::dims`]
//! values: longer upstream vectors are truncated, shorter ones zero-padded
//! (see [`fit_to_dimension`]). Truncation discards information when the
//! model is wider than the column, which can degrade similarity search.

pub mod ollama;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{LlmConfig, LlmProvider};

/// Upstream failure talking to an embedding or completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{provider} connection error (is it running at {url}?): {source}")]
    Transport {
        provider: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Error reported inside an otherwise successful (2xx) response body.
    #[error("{provider} reported an error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },
    #[error("invalid {provider} response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Model facts the chunker and callers size their requests by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmMetadata {
    pub model_name: String,
    pub context_window: usize,
    pub num_output: usize,
}

/// Text → fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn metadata(&self) -> &LlmMetadata;

    /// Width every returned vector is fitted to.
    fn dims(&self) -> usize;

    /// One raw upstream call, before dimension fitting.
    async fn request_embedding(&self, text: &str) -> LlmResult<Vec<f32>>;

    async fn embed_one(&self, text: &str) -> LlmResult<Vec<f32>> {
        let raw = self.request_embedding(text).await?;
        if raw.len() != self.dims() {
            debug!(
                model = %self.metadata().model_name,
                upstream = raw.len(),
                column = self.dims(),
                "fitting embedding to column width"
            );
        }
        Ok(fit_to_dimension(raw, self.dims()))
    }

    /// Repeated single calls, in input order.
    async fn embed_many(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }
}

/// Prompt → generated text.
#[async_trait]
pub trait Completer: Send + Sync {
    fn metadata(&self) -> &LlmMetadata;

    async fn complete(&self, prompt: &str) -> LlmResult<String>;

    /// Stream the response and accumulate every piece into one string.
    async fn stream_complete(&self, prompt: &str) -> LlmResult<String>;
}

/// Truncate or zero-pad `v` to exactly `dims` values.
pub fn fit_to_dimension(mut v: Vec<f32>, dims: usize) -> Vec<f32> {
    v.resize(dims, 0.0);
    v
}

pub fn create_embedder(config: &LlmConfig) -> Result<Box<dyn Embedder>> {
    match config.provider {
        LlmProvider::Ollama => Ok(Box::new(ollama::OllamaEmbedder::new(config)?)),
        LlmProvider::OpenAi => Ok(Box::new(openai::OpenAiEmbedder::new(config)?)),
    }
}

pub fn create_completer(config: &LlmConfig) -> Result<Box<dyn Completer>> {
    match config.provider {
        LlmProvider::Ollama => Ok(Box::new(ollama::OllamaCompleter::new(config)?)),
        LlmProvider::OpenAi => Ok(Box::new(openai::OpenAiCompleter::new(config)?)),
    }
}

pub(crate) fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// POST a JSON body and fail on transport errors and non-2xx statuses.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    provider: &'static str,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
) -> LlmResult<reqwest::Response> {
    let mut request = client.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|source| LlmError::Transport {
        provider,
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status {
            provider,
            status,
            body,
        });
    }
    Ok(response)
}

pub(crate) async fn read_json(
    response: reqwest::Response,
    provider: &'static str,
) -> LlmResult<serde_json::Value> {
    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse {
            provider,
            message: e.to_string(),
        })
}

/// Feed each non-empty line of a streamed body to `on_line` as it
/// arrives. `on_line` returns `false` to stop early.
pub(crate) async fn for_each_line<F>(
    mut response: reqwest::Response,
    provider: &'static str,
    mut on_line: F,
) -> LlmResult<()>
where
    F: FnMut(&str) -> LlmResult<bool> + Send,
{
    let url = response.url().to_string();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| LlmError::Transport {
            provider,
            url: url.clone(),
            source,
        })?
    {
        buf.extend_from_slice(&chunk);
        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if !line.is_empty() && !on_line(line)? {
                return Ok(());
            }
        }
    }

    let rest = String::from_utf8_lossy(&buf);
    let rest = rest.trim();
    if !rest.is_empty() {
        on_line(rest)?;
    }
    Ok(())
}

/// The message of an `error` member in a response or stream event, if any.
/// Ollama sends a string, OpenAI an object with a `message`.
pub(crate) fn error_message(event: &serde_json::Value) -> Option<String> {
    match event.get("error")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(
            other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// Parse a JSON array of numbers into `f32`s.
pub(crate) fn parse_vector(
    value: Option<&serde_json::Value>,
    provider: &'static str,
) -> LlmResult<Vec<f32>> {
    let items = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| LlmError::InvalidResponse {
            provider,
            message: "missing embedding array".to_string(),
        })?;

    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| LlmError::InvalidResponse {
                    provider,
                    message: format!("non-numeric embedding value: {}", v),
                })
        })
        .collect()
}
