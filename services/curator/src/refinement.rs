//! Feedback intent classification and refinement planning

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::{PlaylistDraft, Track};

/// What the feedback asks the engine to do with the current tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementIntent {
    /// Swap part of the playlist; existing ids are excluded from search
    ReplaceSubset,
    /// Keep everything and append new tracks
    AddOnly,
    /// Rebuild the whole list from the merged prompt
    Regenerate,
}

impl RefinementIntent {
    /// Classify free-text feedback. Removal wording wins over addition.
    pub fn classify(feedback: &str) -> Self {
        static REPLACE_REGEX: OnceLock<Regex> = OnceLock::new();
        static ADD_REGEX: OnceLock<Regex> = OnceLock::new();

        let replace = REPLACE_REGEX.get_or_init(|| {
            Regex::new(
                r"(?i)\b(remove|drop|less|fewer|without|replace|swap|skip|no more|get rid of|too many)\b",
            )
            .expect("Failed to compile replace-intent regex")
        });
        let add = ADD_REGEX.get_or_init(|| {
            Regex::new(r"(?i)\b(add|include|append|extend|longer)\b|\bmore (songs|tracks)\b")
                .expect("Failed to compile add-intent regex")
        });

        if replace.is_match(feedback) {
            Self::ReplaceSubset
        } else if add.is_match(feedback) {
            Self::AddOnly
        } else {
            Self::Regenerate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplaceSubset => "replace_subset",
            Self::AddOnly => "add_only",
            Self::Regenerate => "regenerate",
        }
    }
}

/// The original prompt biased by the feedback
pub fn merge_prompt(original: &str, feedback: &str) -> String {
    format!("{}. Refinement: {}", original.trim_end_matches('.'), feedback.trim())
}

/// How one refinement reshapes a draft
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementPlan {
    pub intent: RefinementIntent,
    /// Tracks carried over, in their current order
    pub keep: Vec<Track>,
    /// Ids the new search must not return
    pub exclude: HashSet<String>,
    /// New tracks to fetch so that `keep.len() + fetch == target`
    pub fetch: usize,
}

/// Tracks whose credited artist is named in the feedback
fn named_in_feedback(track: &Track, feedback: &str) -> bool {
    track
        .artist
        .split(", ")
        .map(|a| a.trim().to_lowercase())
        .any(|artist| artist.chars().count() >= 2 && feedback.contains(&artist))
}

impl RefinementPlan {
    /// Plan a refinement towards `target` tracks.
    ///
    /// An add request with nothing left to add becomes a regeneration.
    pub fn build(
        draft: &PlaylistDraft,
        feedback: &str,
        target: usize,
        replace_fraction: f32,
    ) -> Self {
        let mut intent = RefinementIntent::classify(feedback);
        if intent == RefinementIntent::AddOnly && target <= draft.tracks.len() {
            intent = RefinementIntent::Regenerate;
        }

        match intent {
            RefinementIntent::AddOnly => Self {
                intent,
                keep: draft.tracks.clone(),
                exclude: HashSet::new(),
                fetch: target - draft.tracks.len(),
            },
            RefinementIntent::ReplaceSubset => {
                let lowered = feedback.to_lowercase();
                let mut keep: Vec<Track> = draft
                    .tracks
                    .iter()
                    .filter(|t| !named_in_feedback(t, &lowered))
                    .cloned()
                    .collect();

                let replaced = (target as f32 * replace_fraction.clamp(0.0, 1.0)).ceil() as usize;
                keep.truncate(target.saturating_sub(replaced));

                Self {
                    intent,
                    fetch: target - keep.len(),
                    keep,
                    exclude: draft.tracks.iter().map(|t| t.id.clone()).collect(),
                }
            }
            RefinementIntent::Regenerate => Self {
                intent,
                keep: vec![],
                exclude: HashSet::new(),
                fetch: target,
            },
        }
    }
}
