//! Discovery strategy derived per request

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Decade start years a strategy or profile may name
pub const DECADES: RangeInclusive<u16> = 1900..=2090;

/// Decade start year inside [`DECADES`]
pub fn is_valid_decade(decade: u16) -> bool {
    decade % 10 == 0 && DECADES.contains(&decade)
}

/// Search parameters derived from a prompt. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStrategy {
    /// Ordered by relevance, most relevant first
    pub genres: Vec<String>,
    pub moods: Vec<String>,
    /// Decade start years the search should lean towards
    pub decades: Vec<u16>,
    pub energy: f32,
    pub valence: f32,
    /// 0 favours familiar tracks, 1 favours obscure ones
    pub novelty_weight: f32,
}
