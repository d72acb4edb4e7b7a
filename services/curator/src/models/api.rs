//! Request and response payloads for the playlist endpoints

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{draft::PlaylistDraft, profile::UserPreferenceProfile, track::Track};

/// Request for a new playlist
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub count: u32,
    #[serde(default)]
    pub profile: UserPreferenceProfile,
    /// Overrides the novelty weight chosen by the strategy model
    pub discovery_weight: Option<f32>,
}

/// Request to refine an existing draft
#[derive(Debug, Clone, Deserialize)]
pub struct RefineRequest {
    pub feedback: String,
    /// Target size; defaults to the draft's current size
    pub count: Option<u32>,
    #[serde(default)]
    pub profile: UserPreferenceProfile,
}

/// Request to mark a draft as committed to the external catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRequest {
    pub external_playlist_id: String,
}

/// Response for generate and refine
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistResponse {
    pub draft_id: Uuid,
    pub tracks: Vec<Track>,
    pub generated_from: String,
    pub total: usize,
    pub is_refinement: bool,
    pub refinement_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_refinements: Option<u32>,
}

/// Response for draft lookups
#[derive(Debug, Clone, Serialize)]
pub struct DraftResponse {
    #[serde(flatten)]
    pub draft: PlaylistDraft,
    pub remaining_refinements: u32,
}
