//! OpenAI-compatible provider (OpenAI, OpenRouter, vLLM, LM Studio)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

use super::{AiProvider, ProviderError, ProviderResult};
use crate::config::AiProviderConfig;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    embed_model: Option<String>,
    name: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiProviderConfig, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            name: format!("openai:{}", config.model),
        })
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> ProviderResult<reqwest::Response> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name.clone(),
                status,
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, system, prompt), fields(provider = "openai", model = %self.model))]
    async fn submit_strategy_request(&self, system: &str, prompt: &str) -> ProviderResult<String> {
        let messages = [
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ];

        let response = self
            .post(
                "chat/completions",
                json!({
                    "model": self.model,
                    "messages": messages,
                    "response_format": { "type": "json_object" },
                }),
            )
            .await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("completion had no content".to_string()))
    }

    #[instrument(skip(self, texts), fields(provider = "openai", input_count = texts.len()))]
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
            .post("embeddings", json!({ "model": embed_model, "input": texts }))
            .await?;
        let mut result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        result.data.sort_by_key(|d| d.index);
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    fn supports_embeddings(&self) -> bool {
        self.embed_model.is_some()
    }
}
