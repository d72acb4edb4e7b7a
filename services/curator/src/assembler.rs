//! Candidate filtering, ranking and exact-count selection

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::catalog::CatalogSearchAdapter;
use crate::config::RankingConfig;
use crate::error::{CuratorError, CuratorResult};
use crate::models::{CandidateTrack, DiscoveryStrategy, Track, UserPreferenceProfile};

/// What to assemble and around which existing tracks
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    pub strategy: &'a DiscoveryStrategy,
    pub profile: &'a UserPreferenceProfile,
    /// Exact number of new tracks wanted
    pub count: usize,
    /// Ids the catalog search must not return
    pub exclude: &'a HashSet<String>,
    /// Tracks already in the playlist; never duplicated and counted
    /// against the per-artist cap
    pub keep: &'a [Track],
}

/// Credited artists of a possibly comma-joined artist string
fn credited(artist: &str) -> impl Iterator<Item = &str> {
    artist.split(", ").map(str::trim).filter(|a| !a.is_empty())
}

fn artist_key(artist: &str) -> String {
    artist.trim().to_lowercase()
}

#[derive(Clone)]
pub struct PlaylistAssembler {
    config: RankingConfig,
}

impl PlaylistAssembler {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Hard constraints: disliked artists and explicit content
    pub fn admits(&self, candidate: &CandidateTrack, profile: &UserPreferenceProfile) -> bool {
        if credited(&candidate.artist).any(|a| profile.is_disliked(a)) {
            return false;
        }
        profile.allows_explicit() || !candidate.explicit
    }

    /// Composite ranking score.
    ///
    /// A higher novelty weight shifts credit from popular to obscure tracks.
    pub fn score(
        &self,
        candidate: &CandidateTrack,
        strategy: &DiscoveryStrategy,
        profile: &UserPreferenceProfile,
    ) -> f32 {
        let popularity = f32::from(candidate.popularity.min(100)) / 100.0;
        let novelty = strategy.novelty_weight.clamp(0.0, 1.0);

        let mut score = self.config.relevance_weight * candidate.relevance
            + self.config.popularity_weight * popularity * (1.0 - novelty)
            + self.config.novelty_weight * novelty * (1.0 - popularity);

        let favorite = credited(&candidate.artist).any(|a| profile.is_favorite_artist(a))
            || candidate.genres.iter().any(|g| profile.likes_genre(g));
        if favorite {
            score += self.config.favorite_bonus;
        }
        score
    }

    /// Best `count` admissible candidates.
    ///
    /// Prefers at most `max_per_artist` tracks per artist and relaxes that
    /// only when the cap alone would leave the playlist short.
    pub fn select(
        &self,
        candidates: &[CandidateTrack],
        request: &AssemblyRequest<'_>,
    ) -> Vec<CandidateTrack> {
        let mut seen: HashSet<&str> = request.keep.iter().map(|t| t.id.as_str()).collect();
        let mut ranked: Vec<(f32, &CandidateTrack)> = Vec::new();

        for candidate in candidates {
            if !self.admits(candidate, request.profile) || !seen.insert(candidate.id.as_str()) {
                continue;
            }
            ranked.push((self.score(candidate, request.strategy, request.profile), candidate));
        }
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        let mut per_artist: HashMap<String, usize> = HashMap::new();
        for track in request.keep {
            *per_artist.entry(artist_key(&track.artist)).or_default() += 1;
        }

        let mut chosen = Vec::with_capacity(request.count);
        let mut overflow = Vec::new();
        for (_, candidate) in ranked {
            if chosen.len() == request.count {
                break;
            }
            let used = per_artist.entry(artist_key(&candidate.artist)).or_default();
            if *used < self.config.max_per_artist {
                *used += 1;
                chosen.push(candidate.clone());
            } else {
                overflow.push(candidate);
            }
        }

        if chosen.len() < request.count {
            debug!(
                "Relaxing per-artist cap to fill {} slots",
                request.count - chosen.len()
            );
            let missing = request.count - chosen.len();
            chosen.extend(overflow.into_iter().take(missing).cloned());
        }

        chosen
    }

    /// Search, widen and select until exactly `count` tracks are found.
    ///
    /// Fails with `InsufficientResults` after the bounded extra passes
    /// instead of returning a shorter list.
    pub async fn assemble(
        &self,
        catalog: &CatalogSearchAdapter,
        request: &AssemblyRequest<'_>,
    ) -> CuratorResult<Vec<Track>> {
        let mut pool: Vec<CandidateTrack> = Vec::new();
        let mut pooled: HashSet<String> = HashSet::new();
        let mut selected = Vec::new();

        for pass in 0..=self.config.extra_passes {
            let hits = catalog
                .search(request.strategy, request.count, request.exclude, pass)
                .await?;
            for hit in hits {
                if pooled.insert(hit.id.clone()) {
                    pool.push(hit);
                }
            }

            selected = self.select(&pool, request);
            if selected.len() >= request.count {
                debug!(
                    passes = pass + 1,
                    pool = pool.len(),
                    "Assembled {} tracks",
                    selected.len()
                );
                return Ok(selected.into_iter().map(Track::from).collect());
            }

            info!(
                "Pass {} produced {}/{} tracks, widening search",
                pass,
                selected.len(),
                request.count
            );
        }

        Err(CuratorError::InsufficientResults {
            requested: request.count,
            achieved: selected.len(),
        })
    }
}
