//! Prompt to discovery strategy via the AI provider chain

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::RankingConfig;
use crate::error::{CuratorError, CuratorResult};
use crate::models::{DiscoveryStrategy, UserPreferenceProfile, is_valid_decade};
use crate::providers::ProviderChain;
use crate::validation::validate_discovery_weight;

const MAX_GENRES: usize = 8;
const MAX_MOODS: usize = 6;

const SYSTEM_PROMPT: &str = r#"You turn a listener's playlist request into catalog search parameters.
Respond with a single JSON object and nothing else, using exactly these fields:
{
  "genres": ["most relevant genre first", "..."],
  "moods": ["mood or energy descriptor", "..."],
  "decades": [1990, 2000],
  "energy": 0.0,
  "valence": 0.0,
  "novelty_weight": 0.0
}
genres and moods must not be empty. decades are decade start years and may be empty.
energy, valence and novelty_weight are numbers between 0 and 1; novelty_weight 0 means
well-known tracks, 1 means obscure ones. Respect the listener's dislikes."#;

/// Wire shape the model must produce
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrategyPayload {
    genres: Vec<String>,
    moods: Vec<String>,
    #[serde(default)]
    decades: Vec<u16>,
    energy: f32,
    valence: f32,
    novelty_weight: f32,
}

/// Locate the JSON object in a model reply, tolerating code fences
fn extract_json(text: &str) -> Result<&str, String> {
    if let Some(start) = text.find("```json") {
        let json_start = start + "```json".len();
        if let Some(end) = text[json_start..].find("```") {
            return Ok(text[json_start..json_start + end].trim());
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err("No JSON object in response".to_string()),
    }
}

fn unit_interval(name: &str, value: f32) -> Result<f32, String> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(value)
}

fn clean_terms(terms: Vec<String>, limit: usize) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !cleaned.contains(&term) {
            cleaned.push(term);
        }
    }
    cleaned.truncate(limit);
    cleaned
}

/// Parse and validate raw model output.
///
/// Empty or out-of-range fields are errors, never replaced with defaults.
pub fn parse_strategy(raw: &str) -> Result<DiscoveryStrategy, String> {
    let payload: StrategyPayload =
        serde_json::from_str(extract_json(raw)?).map_err(|e| format!("schema violation: {}", e))?;

    let genres = clean_terms(payload.genres, MAX_GENRES);
    if genres.is_empty() {
        return Err("genres must not be empty".to_string());
    }
    let moods = clean_terms(payload.moods, MAX_MOODS);
    if moods.is_empty() {
        return Err("moods must not be empty".to_string());
    }
    if let Some(decade) = payload.decades.iter().find(|d| !is_valid_decade(**d)) {
        return Err(format!("invalid decade {}", decade));
    }

    Ok(DiscoveryStrategy {
        genres,
        moods,
        decades: payload.decades,
        energy: unit_interval("energy", payload.energy)?,
        valence: unit_interval("valence", payload.valence)?,
        novelty_weight: unit_interval("novelty_weight", payload.novelty_weight)?,
    })
}

/// Derives a [`DiscoveryStrategy`] for each request
#[derive(Clone)]
pub struct StrategyGenerator {
    chain: ProviderChain,
    familiar_novelty_cap: f32,
}

impl StrategyGenerator {
    pub fn new(chain: ProviderChain, ranking: &RankingConfig) -> Self {
        Self {
            chain,
            familiar_novelty_cap: ranking.familiar_novelty_cap,
        }
    }

    /// Ask the provider chain for a strategy.
    ///
    /// `discovery_weight`, when given, replaces the model's novelty weight.
    /// Without it a profile that has novelty switched off is capped at the
    /// familiar ceiling.
    #[instrument(skip(self, prompt, profile))]
    pub async fn generate(
        &self,
        prompt: &str,
        profile: &UserPreferenceProfile,
        count: u32,
        discovery_weight: Option<f32>,
    ) -> CuratorResult<DiscoveryStrategy> {
        validate_discovery_weight(discovery_weight).map_err(CuratorError::InvalidRequest)?;

        let instruction = build_instruction(prompt, profile, count);
        let mut strategy = self
            .chain
            .strategy(SYSTEM_PROMPT, &instruction, parse_strategy)
            .await?;

        if strategy.decades.is_empty() {
            strategy.decades = profile.decades.clone();
        }

        strategy.novelty_weight = match discovery_weight {
            Some(weight) => weight,
            None if !profile.novelty_enabled => {
                strategy.novelty_weight.min(self.familiar_novelty_cap)
            }
            None => strategy.novelty_weight,
        };

        debug!(
            genres = ?strategy.genres,
            novelty = strategy.novelty_weight,
            "Derived discovery strategy"
        );
        Ok(strategy)
    }
}

fn build_instruction(prompt: &str, profile: &UserPreferenceProfile, count: u32) -> String {
    let mut lines = vec![
        format!("Request: {}", prompt),
        format!("Tracks wanted: {}", count),
    ];

    if !profile.favorite_artists.is_empty() {
        lines.push(format!("Favourite artists: {}", profile.favorite_artists.join(", ")));
    }
    if !profile.disliked_artists.is_empty() {
        lines.push(format!("Never suggest: {}", profile.disliked_artists.join(", ")));
    }
    if !profile.favorite_genres.is_empty() {
        lines.push(format!("Favourite genres: {}", profile.favorite_genres.join(", ")));
    }
    if !profile.decades.is_empty() {
        let decades: Vec<String> = profile.decades.iter().map(|d| format!("{}s", d)).collect();
        lines.push(format!("Preferred decades: {}", decades.join(", ")));
    }
    if let Some(energy) = profile.answers.energy {
        lines.push(format!("Energy preference: {:?}", energy).to_lowercase());
    }
    if let Some(vocals) = profile.answers.vocals {
        lines.push(format!("Vocal preference: {:?}", vocals).to_lowercase());
    }
    if let Some(discovery) = profile.answers.discovery {
        lines.push(format!("Discovery openness: {:?}", discovery).to_lowercase());
    }
    if !profile.allows_explicit() {
        lines.push("Avoid explicit content".to_string());
    }

    lines.join("\n")
}
