//! Track models

use serde::{Deserialize, Serialize};

/// A search hit from the external catalog, held for one request only
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Catalog popularity, 0-100
    pub popularity: u8,
    pub genres: Vec<String>,
    pub explicit: bool,
    pub release_year: Option<u16>,
    /// Search-order relevance in [0, 1], set by the catalog adapter
    pub relevance: f32,
}

/// A track as stored in a draft and returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub popularity: u8,
    pub genres: Vec<String>,
}

impl From<CandidateTrack> for Track {
    fn from(candidate: CandidateTrack) -> Self {
        Self {
            id: candidate.id,
            title: candidate.title,
            artist: candidate.artist,
            album: candidate.album,
            popularity: candidate.popularity,
            genres: candidate.genres,
        }
    }
}
