//! Input validation and semantic prompt screening

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::config::ValidatorConfig;
use crate::error::{CuratorError, CuratorResult};
use crate::providers::ProviderChain;

/// Collapse runs of whitespace and trim
pub fn normalize_prompt(prompt: &str) -> String {
    static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = WHITESPACE_REGEX
        .get_or_init(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

    regex.replace_all(prompt.trim(), " ").into_owned()
}

/// Validate prompt text before any provider is involved
pub fn validate_prompt_text(prompt: &str, max_chars: usize) -> Result<(), String> {
    if prompt.trim().is_empty() {
        return Err("Prompt is required".to_string());
    }

    if prompt.chars().count() > max_chars {
        return Err(format!("Prompt must be at most {} characters long", max_chars));
    }

    static CONTROL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = CONTROL_REGEX.get_or_init(|| {
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("Failed to compile control regex")
    });

    if regex.is_match(prompt) {
        return Err("Prompt contains control characters".to_string());
    }

    Ok(())
}

/// Validate refinement feedback
pub fn validate_feedback(feedback: &str, max_chars: usize) -> Result<(), String> {
    validate_prompt_text(feedback, max_chars).map_err(|e| e.replacen("Prompt", "Feedback", 1))
}

/// Validate a requested track count against inclusive bounds
pub fn validate_count(count: u32, (min, max): (u32, u32)) -> Result<(), String> {
    if count < min || count > max {
        return Err(format!("Track count must be between {} and {}", min, max));
    }
    Ok(())
}

/// Validate an optional discovery weight override
pub fn validate_discovery_weight(weight: Option<f32>) -> Result<(), String> {
    match weight {
        Some(w) if !w.is_finite() || !(0.0..=1.0).contains(&w) => Err(format!(
            "discovery_weight must be within [0, 1], got {}",
            w
        )),
        _ => Ok(()),
    }
}

/// Embedding-based "is this about music, mood or activity" check
#[derive(Clone)]
pub struct PromptValidator {
    chain: ProviderChain,
    threshold: f32,
    references: Vec<String>,
    max_chars: usize,
}

impl PromptValidator {
    pub fn new(config: &ValidatorConfig, chain: ProviderChain) -> Self {
        Self {
            chain,
            threshold: config.threshold,
            references: config.reference_phrases.clone(),
            max_chars: config.max_prompt_chars,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Score the prompt and reject it below the threshold.
    ///
    /// Returns the score on acceptance. An unavailable embedding provider
    /// surfaces as `UpstreamUnavailable`.
    pub async fn validate(&self, prompt: &str) -> CuratorResult<f32> {
        validate_prompt_text(prompt, self.max_chars).map_err(CuratorError::InvalidRequest)?;

        let normalized = normalize_prompt(prompt);
        let score = self.chain.similarity(&normalized, &self.references).await?;

        if score < self.threshold {
            info!(
                "Prompt rejected with similarity {:.3} (threshold {:.3})",
                score, self.threshold
            );
            return Err(CuratorError::ValidationFailed {
                score,
                threshold: self.threshold,
            });
        }

        debug!("Prompt accepted with similarity {:.3}", score);
        Ok(score)
    }
}
