//! Pluggable AI and catalog providers
//!
//! Every concrete provider sits behind [`AiProvider`] or
//! [`CatalogProvider`]. The [`ProviderChain`] walks an ordered list of
//! equivalent AI providers; it never substitutes a weaker heuristic when
//! they all fail.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AiConfig, AiProviderKind};
use crate::error::{CuratorError, CuratorResult};
use crate::models::CandidateTrack;

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod spotify;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use spotify::SpotifyCatalog;

/// Failure of a single upstream call
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("{provider} does not support {capability}")]
    Unsupported {
        provider: String,
        capability: &'static str,
    },
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl From<ProviderError> for CuratorError {
    fn from(err: ProviderError) -> Self {
        CuratorError::UpstreamUnavailable(err.to_string())
    }
}

/// Generative model plus optional embedding model behind one endpoint
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send a structured instruction and return the raw model text
    async fn submit_strategy_request(&self, system: &str, prompt: &str) -> ProviderResult<String>;

    /// Embed each input text
    async fn embed(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>>;

    fn supports_embeddings(&self) -> bool;

    /// Highest cosine similarity between `text` and any reference phrase
    async fn submit_similarity_request(
        &self,
        text: &str,
        references: &[String],
    ) -> ProviderResult<f32> {
        let mut inputs = Vec::with_capacity(references.len() + 1);
        inputs.push(text.to_string());
        inputs.extend(references.iter().cloned());

        let vectors = self.embed(&inputs).await?;
        if vectors.len() != inputs.len() {
            return Err(ProviderError::Malformed(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }

        let (query, refs) = vectors.split_first().ok_or_else(|| {
            ProviderError::Malformed("embedding response was empty".to_string())
        })?;

        refs.iter()
            .map(|r| cosine_similarity(query, r))
            .try_fold(f32::MIN, |best, score| score.map(|s| best.max(s)))
    }
}

/// Cosine similarity of two equal-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> ProviderResult<f32> {
    if a.len() != b.len() || a.is_empty() {
        return Err(ProviderError::Malformed(format!(
            "embedding dimensions differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(ProviderError::Malformed("zero-length embedding".to_string()));
    }

    Ok(dot / (norm_a * norm_b))
}

/// One catalog search query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Provider-specific query text, e.g. `genre:"indie rock" year:1990-1999`
    pub text: String,
    pub limit: u32,
    pub offset: u32,
}

/// External music catalog
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Ranked hits for one query, best first
    async fn search(&self, query: &CatalogQuery) -> ProviderResult<Vec<CandidateTrack>>;
}

/// Ordered list of equivalent AI providers with a per-call timeout
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn AiProvider>>,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Build the chain described by configuration, in listed order
    pub fn from_config(config: &AiConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut providers: Vec<Arc<dyn AiProvider>> = Vec::with_capacity(config.providers.len());

        for entry in &config.providers {
            let provider: Arc<dyn AiProvider> = match entry.kind {
                AiProviderKind::Ollama => Arc::new(OllamaProvider::new(entry, timeout)?),
                AiProviderKind::OpenAi => Arc::new(OpenAiProvider::new(entry, timeout)?),
                AiProviderKind::Anthropic => Arc::new(AnthropicProvider::new(entry, timeout)?),
            };
            info!("Registered AI provider {}", provider.name());
            providers.push(provider);
        }

        Ok(Self::new(providers, timeout))
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Ask each provider in turn until one yields output `parse` accepts.
    ///
    /// Malformed output counts as a provider failure.
    pub async fn strategy<T, F>(&self, system: &str, prompt: &str, parse: F) -> CuratorResult<T>
    where
        T: Send,
        F: Fn(&str) -> Result<T, String> + Send + Sync,
    {
        let mut failures = Vec::new();

        for provider in &self.providers {
            let outcome =
                tokio::time::timeout(self.timeout, provider.submit_strategy_request(system, prompt))
                    .await
                    .unwrap_or(Err(ProviderError::Timeout(self.timeout)))
                    .and_then(|raw| parse(&raw).map_err(ProviderError::Malformed));

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("AI provider {} failed, trying next: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(exhausted("strategy", failures))
    }

    /// Similarity score from the first embedding-capable provider that answers
    pub async fn similarity(&self, text: &str, references: &[String]) -> CuratorResult<f32> {
        let mut failures = Vec::new();

        for provider in self.providers.iter().filter(|p| p.supports_embeddings()) {
            let outcome = tokio::time::timeout(
                self.timeout,
                provider.submit_similarity_request(text, references),
            )
            .await
            .unwrap_or(Err(ProviderError::Timeout(self.timeout)));

            match outcome {
                Ok(score) => return Ok(score),
                Err(e) => {
                    warn!(
                        "Embedding provider {} failed, trying next: {}",
                        provider.name(),
                        e
                    );
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(exhausted("embedding", failures))
    }
}

fn exhausted(capability: &str, failures: Vec<String>) -> CuratorError {
    if failures.is_empty() {
        return CuratorError::UpstreamUnavailable(format!(
            "no {} provider configured",
            capability
        ));
    }
    CuratorError::UpstreamUnavailable(format!(
        "all {} providers failed: {}",
        capability,
        failures.join("; ")
    ))
}
