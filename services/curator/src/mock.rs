//! Deterministic provider doubles for tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::CandidateTrack;
use crate::providers::{
    AiProvider, CatalogProvider, CatalogQuery, ProviderError, ProviderResult,
};

/// A well-formed strategy payload
pub const STRATEGY_JSON: &str = r#"{
    "genres": ["indie rock", "alternative", "garage rock"],
    "moods": ["upbeat", "energetic"],
    "decades": [2000, 2010],
    "energy": 0.8,
    "valence": 0.7,
    "novelty_weight": 0.5
}"#;

/// Scriptable AI provider with call counters
pub struct MockAiProvider {
    name: String,
    completion: Option<String>,
    delay: Duration,
    embeddings: bool,
    similarity: f32,
    strategy_calls: AtomicUsize,
    similarity_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockAiProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            completion: Some(STRATEGY_JSON.to_string()),
            delay: Duration::ZERO,
            embeddings: true,
            similarity: 0.9,
            strategy_calls: AtomicUsize::new(0),
            similarity_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails
    pub fn failing(name: &str) -> Self {
        Self {
            completion: None,
            ..Self::new(name)
        }
    }

    pub fn with_completion(mut self, text: &str) -> Self {
        self.completion = Some(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_similarity(mut self, score: f32) -> Self {
        self.similarity = score;
        self
    }

    pub fn without_embeddings(mut self) -> Self {
        self.embeddings = false;
        self
    }

    pub fn strategy_calls(&self) -> usize {
        self.strategy_calls.load(Ordering::SeqCst)
    }

    pub fn similarity_calls(&self) -> usize {
        self.similarity_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn unavailable(&self) -> ProviderError {
        ProviderError::Status {
            provider: self.name.clone(),
            status: 503,
            body: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit_strategy_request(&self, _system: &str, prompt: &str) -> ProviderResult<String> {
        self.strategy_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completion.clone().ok_or_else(|| self.unavailable())
    }

    async fn embed(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        if !self.embeddings {
            return Err(ProviderError::Unsupported {
                provider: self.name.clone(),
                capability: "embeddings",
            });
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn supports_embeddings(&self) -> bool {
        self.embeddings
    }

    async fn submit_similarity_request(
        &self,
        _text: &str,
        _references: &[String],
    ) -> ProviderResult<f32> {
        self.similarity_calls.fetch_add(1, Ordering::SeqCst);
        if self.completion.is_none() {
            return Err(self.unavailable());
        }
        Ok(self.similarity)
    }
}

/// Catalog serving slices of a fixed track list
pub struct MockCatalog {
    tracks: Vec<CandidateTrack>,
    /// Start each query at a text-dependent position instead of zero
    varied: bool,
    failing_substring: Option<String>,
    queries: Mutex<Vec<CatalogQuery>>,
}

impl MockCatalog {
    /// `size` tracks with ids `trk-000`, `trk-001`, ...
    pub fn with_tracks(size: usize) -> Self {
        let tracks = (0..size)
            .map(|i| CandidateTrack {
                id: format!("trk-{:03}", i),
                title: format!("Track {}", i),
                artist: format!("Artist {}", i % 25),
                album: format!("Album {}", i / 10),
                popularity: ((i * 37) % 100) as u8,
                genres: vec![],
                explicit: i % 7 == 3,
                release_year: Some(1990 + (i % 30) as u16),
                relevance: 0.0,
            })
            .collect();

        Self {
            tracks,
            varied: false,
            failing_substring: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Different query texts read different windows of the catalog
    pub fn varied(mut self) -> Self {
        self.varied = true;
        self
    }

    /// Fail every query whose text contains `needle`; empty fails all
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing_substring = Some(needle.to_string());
        self
    }

    pub fn queries(&self) -> Vec<CatalogQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogProvider for MockCatalog {
    fn name(&self) -> &str {
        "mock-catalog"
    }

    async fn search(&self, query: &CatalogQuery) -> ProviderResult<Vec<CandidateTrack>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        if let Some(needle) = &self.failing_substring {
            if query.text.contains(needle.as_str()) {
                return Err(ProviderError::Status {
                    provider: "mock-catalog".to_string(),
                    status: 500,
                    body: "boom".to_string(),
                });
            }
        }

        if !self.varied {
            return Ok(self
                .tracks
                .iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .cloned()
                .collect());
        }

        let size = self.tracks.len();
        if size == 0 {
            return Ok(vec![]);
        }
        let start = query.text.bytes().map(usize::from).sum::<usize>() + query.offset as usize;
        Ok((0..(query.limit as usize).min(size))
            .map(|k| self.tracks[(start + k) % size].clone())
            .collect())
    }
}
