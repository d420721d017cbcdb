//! Ollama provider.
//!
//! Embeddings: `POST {base_url}/api/embeddings` with `{model, prompt}`,
//! answered by `{"embedding": [...]}`.
//! Completions: `POST {base_url}/api/generate` with `{model, prompt,
//! stream}`. Non-streaming answers are `{"response": "..."}`; streaming
//! answers are newline-delimited JSON objects, each carrying a `response`
//! fragment, the last one with `"done": true`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::{
    error_message, for_each_line, http_client, parse_vector, post_json, read_json, Completer,
    Embedder, LlmError, LlmMetadata, LlmResult,
};
use crate::config::LlmConfig;

const PROVIDER: &str = "ollama";

pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    dims: usize,
    metadata: LlmMetadata,
}

impl OllamaEmbedder {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dims: config.embedding_dims,
            metadata: LlmMetadata {
                model_name: config.embed_model.clone(),
                context_window: config.context_window,
                num_output: config.num_output,
            },
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn metadata(&self) -> &LlmMetadata {
        &self.metadata
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn request_embedding(&self, text: &str) -> LlmResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({
            "model": self.metadata.model_name,
            "prompt": text,
        });
        let response = post_json(&self.client, PROVIDER, &url, None, &body).await?;
        let json = read_json(response, PROVIDER).await?;
        parse_vector(json.get("embedding"), PROVIDER)
    }
}

pub struct OllamaCompleter {
    client: reqwest::Client,
    base_url: String,
    metadata: LlmMetadata,
}

impl OllamaCompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            metadata: LlmMetadata {
                model_name: config.model.clone(),
                context_window: config.context_window,
                num_output: config.num_output,
            },
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn metadata(&self) -> &LlmMetadata {
        &self.metadata
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.metadata.model_name,
            "prompt": prompt,
            "stream": false,
        });
        let response = post_json(&self.client, PROVIDER, &url, None, &body).await?;
        let json = read_json(response, PROVIDER).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER,
                message: "missing response field".to_string(),
            })
    }

    async fn stream_complete(&self, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.metadata.model_name,
            "prompt": prompt,
            "stream": true,
        });
        let response = post_json(&self.client, PROVIDER, &url, None, &body).await?;

        let mut full = String::new();
        for_each_line(response, PROVIDER, |line| {
            let event: serde_json::Value =
                serde_json::from_str(line).map_err(|e| LlmError::InvalidResponse {
                    provider: PROVIDER,
                    message: format!("bad stream line: {}", e),
                })?;
            if let Some(message) = error_message(&event) {
                return Err(LlmError::Upstream {
                    provider: PROVIDER,
                    message,
                });
            }
            if let Some(piece) = event.get("response").and_then(|r| r.as_str()) {
                full.push_str(piece);
            }
            let done = event.get("done").and_then(|d| d.as_bool()).unwrap_or(false);
            Ok(!done)
        })
        .await?;

        Ok(full)
    }
}
