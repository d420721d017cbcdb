//! OpenAI provider, the fallback when no Ollama instance is available.
//!
//! Embeddings: `POST {openai_base_url}/v1/embeddings` with `{model, input}`.
//! Completions: `POST {openai_base_url}/v1/chat/completions` with a single
//! user message. Streaming answers are server-sent events (`data: {...}`
//! lines) terminated by `data: [DONE]`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use super::{
    error_message, for_each_line, http_client, parse_vector, post_json, read_json, Completer,
    Embedder, LlmError, LlmMetadata, LlmResult,
};
use crate::config::LlmConfig;

const PROVIDER: &str = "openai";

fn api_key(config: &LlmConfig) -> Result<String> {
    config
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    dims: usize,
    metadata: LlmMetadata,
}

impl OpenAiEmbedder {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: api_key(config)?,
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
impl Embedder for OpenAiEmbedder {
    fn metadata(&self) -> &LlmMetadata {
        &self.metadata
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn request_embedding(&self, text: &str) -> LlmResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.metadata.model_name,
            "input": text,
        });
        let response = post_json(
            &self.client,
            PROVIDER,
            &url,
            Some(self.api_key.as_str()),
            &body,
        )
        .await?;
        let json = read_json(response, PROVIDER).await?;
        parse_vector(json.pointer("/data/0/embedding"), PROVIDER)
    }
}

pub struct OpenAiCompleter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    metadata: LlmMetadata,
}

impl OpenAiCompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: api_key(config)?,
            metadata: LlmMetadata {
                model_name: config.model.clone(),
                context_window: config.context_window,
                num_output: config.num_output,
            },
        })
    }

    fn body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        json!({
            "model": self.metadata.model_name,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.metadata.num_output,
            "stream": stream,
        })
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn metadata(&self) -> &LlmMetadata {
        &self.metadata
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.body(prompt, false);
        let response = post_json(
            &self.client,
            PROVIDER,
            &url,
            Some(self.api_key.as_str()),
            &body,
        )
        .await?;
        let json = read_json(response, PROVIDER).await?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER,
                message: "missing choices[0].message.content".to_string(),
            })
    }

    async fn stream_complete(&self, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.body(prompt, true);
        let response = post_json(
            &self.client,
            PROVIDER,
            &url,
            Some(self.api_key.as_str()),
            &body,
        )
        .await?;

        let mut full = String::new();
        for_each_line(response, PROVIDER, |line| {
            let Some(data) = line.strip_prefix("data:") else {
                return Ok(true);
            };
            let data = data.trim();
            if data == "[DONE]" {
                return Ok(false);
            }
            let event: serde_json::Value =
                serde_json::from_str(data).map_err(|e| LlmError::InvalidResponse {
                    provider: PROVIDER,
                    message: format!("bad stream event: {}", e),
                })?;
            if let Some(message) = error_message(&event) {
                return Err(LlmError::Upstream {
                    provider: PROVIDER,
                    message,
                });
            }
            if let Some(piece) = event
                .pointer("/choices/0/delta/content")
                .and_then(|c| c.as_str())
            {
                full.push_str(piece);
            }
            Ok(true)
        })
        .await?;

        Ok(full)
    }
}
