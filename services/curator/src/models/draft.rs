//! Playlist draft model and its state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::track::Track;

/// Lifecycle status of a draft. `Committed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Committed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Committed => "committed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "committed" => Some(Self::Committed),
            _ => None,
        }
    }
}

/// Draft playlist entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDraft {
    pub id: Uuid,
    pub owner_key: String,
    pub session_id: String,
    pub prompt: String,
    pub tracks: Vec<Track>,
    pub refinement_count: u32,
    pub status: DraftStatus,
    pub external_playlist_id: Option<String>,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlaylistDraft {
    /// Create a fresh draft from a successful generation
    pub fn new(owner_key: &str, session_id: &str, prompt: &str, tracks: Vec<Track>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_key: owner_key.to_string(),
            session_id: session_id.to_string(),
            prompt: prompt.to_string(),
            tracks,
            refinement_count: 0,
            status: DraftStatus::Draft,
            external_playlist_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.status == DraftStatus::Committed
    }

    pub fn remaining_refinements(&self, max_refinements: u32) -> u32 {
        max_refinements.saturating_sub(self.refinement_count)
    }

    #[cfg(test)]
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }

    /// Produce the next revision with a replaced track list.
    ///
    /// Track list, counter and version change together.
    pub fn refined(&self, tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            refinement_count: self.refinement_count + 1,
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Produce the committed revision, or `None` if already committed.
    pub fn committed(&self, external_playlist_id: &str) -> Option<Self> {
        if self.is_committed() {
            return None;
        }
        Some(Self {
            status: DraftStatus::Committed,
            external_playlist_id: Some(external_playlist_id.to_string()),
            version: self.version + 1,
            updated_at: Utc::now(),
            ..self.clone()
        })
    }
}
