//! Ollama provider: chat generation and embeddings on a local endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::{AiProvider, ProviderError, ProviderResult};
use crate::config::AiProviderConfig;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    /// Ollama format enforcement, `"json"` for guaranteed valid JSON output
    format: &'a str,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama inference backend
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    embed_model: Option<String>,
    name: String,
}

impl OllamaProvider {
    pub fn new(config: &AiProviderConfig, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            name: format!("ollama:{}", config.model),
        })
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, system, prompt), fields(provider = "ollama", model = %self.model))]
    async fn submit_strategy_request(&self, system: &str, prompt: &str) -> ProviderResult<String> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name.clone(),
                status,
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Ollama generation complete"
        );
        Ok(chat.message.content)
    }

    #[instrument(skip(self, texts), fields(provider = "ollama", input_count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        let embed_model = self
            .embed_model
            .as_deref()
            .ok_or_else(|| ProviderError::Unsupported {
                provider: self.name.clone(),
                capability: "embeddings",
            })?;

        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: embed_model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name.clone(),
                status,
                body,
            });
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(result.embeddings)
    }

    fn supports_embeddings(&self) -> bool {
        self.embed_model.is_some()
    }
}
