//! Strategy to catalog queries, fan-out and candidate merging

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CatalogConfig;
use crate::error::{CuratorError, CuratorResult};
use crate::models::{CandidateTrack, DiscoveryStrategy};
use crate::providers::{CatalogProvider, CatalogQuery, ProviderError};

/// A query plus the genre it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub query: CatalogQuery,
    pub genre: Option<String>,
}

/// Bounded, overfetching search over one [`CatalogProvider`]
#[derive(Clone)]
pub struct CatalogSearchAdapter {
    provider: Arc<dyn CatalogProvider>,
    overfetch_factor: u32,
    max_queries: usize,
    page_limit: u32,
    timeout: Duration,
}

impl CatalogSearchAdapter {
    pub fn new(provider: Arc<dyn CatalogProvider>, config: &CatalogConfig) -> Self {
        Self {
            provider,
            overfetch_factor: config.overfetch_factor.max(1),
            max_queries: config.max_queries.max(1),
            page_limit: config.page_limit.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Queries for one pass.
    ///
    /// Pass 0 pairs the leading genres with the decade window. Widened
    /// passes drop the era filter, reach further down the genre list, add
    /// mood-only queries and page past earlier results.
    pub fn plan_queries(
        &self,
        strategy: &DiscoveryStrategy,
        count: usize,
        widen: u32,
    ) -> Vec<PlannedQuery> {
        let mut texts: Vec<(String, Option<String>)> = Vec::new();
        let budget = self.max_queries + widen as usize;

        let year_filter = if widen == 0 {
            decade_window(&strategy.decades)
        } else {
            None
        };

        for genre in &strategy.genres {
            let text = match &year_filter {
                Some(years) => format!("genre:\"{}\" {}", genre, years),
                None => format!("genre:\"{}\"", genre),
            };
            texts.push((text, Some(genre.clone())));
        }
        if widen == 0 {
            texts.truncate(self.max_queries);
        }

        if let Some(lead) = strategy.genres.first() {
            for mood in &strategy.moods {
                texts.push((format!("{} {}", mood, lead), Some(lead.clone())));
            }
        }
        if widen > 0 {
            for mood in &strategy.moods {
                texts.push((mood.clone(), None));
            }
        }
        texts.truncate(budget);

        let per_query = self.per_query_limit(count, texts.len());
        texts
            .into_iter()
            .map(|(text, genre)| PlannedQuery {
                query: CatalogQuery {
                    text,
                    limit: per_query,
                    offset: widen * per_query,
                },
                genre,
            })
            .collect()
    }

    fn per_query_limit(&self, count: usize, queries: usize) -> u32 {
        let wanted = count as u32 * self.overfetch_factor;
        let queries = queries.max(1) as u32;
        wanted.div_ceil(queries).clamp(1, self.page_limit)
    }

    /// Run one pass and merge the hits.
    ///
    /// Order is preserved by interleaving queries rank by rank. Ids in
    /// `exclude` never come back. Individual query failures are tolerated;
    /// when every query fails the pass is `UpstreamUnavailable`.
    pub async fn search(
        &self,
        strategy: &DiscoveryStrategy,
        count: usize,
        exclude: &HashSet<String>,
        widen: u32,
    ) -> CuratorResult<Vec<CandidateTrack>> {
        let planned = self.plan_queries(strategy, count, widen);
        if planned.is_empty() {
            return Err(CuratorError::UpstreamUnavailable(
                "strategy produced no catalog queries".to_string(),
            ));
        }

        let outcomes = join_all(planned.iter().map(|p| async move {
            tokio::time::timeout(self.timeout, self.provider.search(&p.query))
                .await
                .unwrap_or(Err(ProviderError::Timeout(self.timeout)))
        }))
        .await;

        let mut failures = Vec::new();
        let mut pages = Vec::with_capacity(planned.len());
        for (plan, outcome) in planned.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => pages.push((plan, hits)),
                Err(e) => {
                    warn!(
                        "{} query '{}' failed: {}",
                        self.provider.name(),
                        plan.query.text,
                        e
                    );
                    failures.push(e.to_string());
                }
            }
        }

        if pages.is_empty() {
            return Err(CuratorError::UpstreamUnavailable(format!(
                "all {} catalog queries failed: {}",
                planned.len(),
                failures.join("; ")
            )));
        }

        let merged = merge_pages(pages, planned.len(), exclude);
        debug!(
            pass = widen,
            queries = planned.len(),
            failed = failures.len(),
            candidates = merged.len(),
            "Catalog pass complete"
        );
        Ok(merged)
    }
}

/// `year:1990-2009` spanning every requested decade
fn decade_window(decades: &[u16]) -> Option<String> {
    let first = decades.iter().min()?;
    let last = decades.iter().max()?;
    Some(format!("year:{}-{}", first, last.saturating_add(9)))
}

fn merge_pages(
    pages: Vec<(&PlannedQuery, Vec<CandidateTrack>)>,
    total_queries: usize,
    exclude: &HashSet<String>,
) -> Vec<CandidateTrack> {
    let longest = pages.iter().map(|(_, hits)| hits.len()).max().unwrap_or(0);
    let mut merged: Vec<CandidateTrack> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for rank in 0..longest {
        for (query_idx, (plan, hits)) in pages.iter().enumerate() {
            let Some(hit) = hits.get(rank) else {
                continue;
            };
            if exclude.contains(&hit.id) {
                continue;
            }

            if let Some(&existing) = index.get(&hit.id) {
                if let Some(genre) = &plan.genre {
                    let tags = &mut merged[existing].genres;
                    if !tags.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
                        tags.push(genre.clone());
                    }
                }
                continue;
            }

            let position_score = 1.0 - rank as f32 / hits.len() as f32;
            let query_score = 1.0 - query_idx as f32 / total_queries as f32;

            let mut candidate = hit.clone();
            candidate.relevance = 0.5 * position_score + 0.5 * query_score;
            if let Some(genre) = &plan.genre {
                if !candidate.genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
                    candidate.genres.push(genre.clone());
                }
            }

            index.insert(candidate.id.clone(), merged.len());
            merged.push(candidate);
        }
    }

    merged
}
