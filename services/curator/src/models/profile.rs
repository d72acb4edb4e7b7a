//! User preference profile

use serde::{Deserialize, Serialize};

use super::strategy::is_valid_decade;

pub const MAX_ARTISTS: usize = 50;
pub const MAX_GENRES: usize = 20;
pub const MAX_DECADES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyPreference {
    Calm,
    Balanced,
    Intense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocalPreference {
    Vocal,
    Instrumental,
    NoPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplicitTolerance {
    #[default]
    Allow,
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOpenness {
    Familiar,
    Balanced,
    Adventurous,
}

/// Answers to the onboarding personality questions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalityAnswers {
    pub energy: Option<EnergyPreference>,
    pub vocals: Option<VocalPreference>,
    #[serde(default)]
    pub explicit: ExplicitTolerance,
    pub discovery: Option<DiscoveryOpenness>,
}

/// Listening preferences supplied with each request
///
/// Owned and mutated by the caller's session; the pipeline only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPreferenceProfile {
    #[serde(default)]
    pub favorite_artists: Vec<String>,
    #[serde(default)]
    pub disliked_artists: Vec<String>,
    #[serde(default)]
    pub favorite_genres: Vec<String>,
    /// Decade start years, e.g. 1990
    #[serde(default)]
    pub decades: Vec<u16>,
    #[serde(default)]
    pub answers: PersonalityAnswers,
    #[serde(default)]
    pub novelty_enabled: bool,
}

impl UserPreferenceProfile {
    /// Check the bounded collections
    pub fn validate(&self) -> Result<(), String> {
        if self.favorite_artists.len() > MAX_ARTISTS {
            return Err(format!("At most {} favorite artists allowed", MAX_ARTISTS));
        }
        if self.disliked_artists.len() > MAX_ARTISTS {
            return Err(format!("At most {} disliked artists allowed", MAX_ARTISTS));
        }
        if self.favorite_genres.len() > MAX_GENRES {
            return Err(format!("At most {} favorite genres allowed", MAX_GENRES));
        }
        if self.decades.len() > MAX_DECADES {
            return Err(format!("At most {} decades allowed", MAX_DECADES));
        }
        if let Some(decade) = self.decades.iter().find(|d| !is_valid_decade(**d)) {
            return Err(format!(
                "Decade {} must be a multiple of ten between 1900 and 2090",
                decade
            ));
        }
        Ok(())
    }

    pub fn is_disliked(&self, artist: &str) -> bool {
        self.disliked_artists
            .iter()
            .any(|a| a.eq_ignore_ascii_case(artist.trim()))
    }

    pub fn is_favorite_artist(&self, artist: &str) -> bool {
        self.favorite_artists
            .iter()
            .any(|a| a.eq_ignore_ascii_case(artist.trim()))
    }

    pub fn likes_genre(&self, genre: &str) -> bool {
        self.favorite_genres
            .iter()
            .any(|g| g.eq_ignore_ascii_case(genre.trim()))
    }

    pub fn allows_explicit(&self) -> bool {
        self.answers.explicit == ExplicitTolerance::Allow
    }
}
