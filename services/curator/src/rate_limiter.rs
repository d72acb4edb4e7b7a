//! Daily generation and refinement quotas

use chrono::{NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::LimitsConfig;
use crate::error::{CuratorError, CuratorResult};
use crate::models::{KindUsage, LimitKind, PlaylistDraft, RateLimitRecord, RateLimitStatus};
use crate::store::CounterStore;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Generations allowed per owner per day
    pub generation_limit: u32,
    pub generation_enabled: bool,
    /// Refinements allowed per owner per day, across all drafts
    pub refinement_limit: u32,
    pub refinement_enabled: bool,
    /// Refinements allowed on a single draft, always enforced
    pub max_refinements_per_playlist: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for RateLimiterConfig {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            generation_limit: limits.generation_limit,
            generation_enabled: limits.generation_enabled,
            refinement_limit: limits.refinement_limit,
            refinement_enabled: limits.refinement_enabled,
            max_refinements_per_playlist: limits.max_refinements_per_playlist,
        }
    }
}

impl RateLimiterConfig {
    fn for_kind(&self, kind: LimitKind) -> (u32, bool) {
        match kind {
            LimitKind::Generation => (self.generation_limit, self.generation_enabled),
            LimitKind::Refinement => (self.refinement_limit, self.refinement_enabled),
        }
    }
}

/// A slot taken from a daily quota
///
/// Either keep it with [`Reservation::commit`] once the request succeeded or
/// hand it back with [`RateLimiter::release`]. A reservation dropped before
/// either, e.g. because the request future was cancelled, releases its slot
/// in the background.
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    kind: LimitKind,
    /// `None` when the kind is disabled and nothing was counted
    key: Option<String>,
    used: u32,
    settled: bool,
    store: Arc<dyn CounterStore>,
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("used", &self.used)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Reservation {
    pub fn kind(&self) -> LimitKind {
        self.kind
    }

    /// Count after this reservation, zero when unmetered
    #[cfg(test)]
    pub fn used(&self) -> u32 {
        self.used
    }

    #[cfg(test)]
    pub fn is_metered(&self) -> bool {
        self.key.is_some()
    }

    /// Keep the slot. A committed slot is consumed for the day.
    pub fn commit(mut self) {
        self.settled = true;
        if let Some(key) = &self.key {
            debug!("Committed reservation {} ({} used)", key, self.used);
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Some(key) = self.key.take() else {
            return;
        };

        warn!("Unsettled {} reservation {} dropped, releasing", self.kind, key);
        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.release(&key).await {
                        error!("Failed to release abandoned reservation {}: {}", key, e);
                    }
                });
            }
            Err(_) => error!("No runtime left to release reservation {}", key),
        }
    }
}

/// Rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    /// Rate limiter configuration
    config: RateLimiterConfig,
    /// Backing counters, keyed by kind, owner and day
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { config, store }
    }

    fn counter_key(owner_key: &str, kind: LimitKind, day: NaiveDate) -> String {
        format!("ratelimit:{}:{}:{}", kind, owner_key, day.format("%Y-%m-%d"))
    }

    /// Reserve one slot of `kind` for today using the configured limits
    pub async fn check_and_reserve(
        &self,
        owner_key: &str,
        kind: LimitKind,
    ) -> CuratorResult<Reservation> {
        let (limit, enabled) = self.config.for_kind(kind);
        self.reserve(owner_key, kind, limit, enabled, Utc::now().date_naive())
            .await
    }

    /// Reserve one slot of `kind` on `day`.
    ///
    /// A disabled kind always succeeds without touching a counter.
    pub async fn reserve(
        &self,
        owner_key: &str,
        kind: LimitKind,
        limit: u32,
        enabled: bool,
        day: NaiveDate,
    ) -> CuratorResult<Reservation> {
        if !enabled {
            return Ok(Reservation {
                kind,
                key: None,
                used: 0,
                settled: false,
                store: self.store.clone(),
            });
        }

        let key = Self::counter_key(owner_key, kind, day);
        match self.store.increment_with_ceiling(&key, limit).await? {
            Some(used) => {
                debug!("Reserved {} slot {}/{} for {}", kind, used, limit, owner_key);
                Ok(Reservation {
                    kind,
                    key: Some(key),
                    used,
                    settled: false,
                    store: self.store.clone(),
                })
            }
            None => {
                let used = self.store.get(&key).await?;
                info!(
                    "Rate limit reached for {}: {} {}/{}",
                    owner_key, kind, used, limit
                );
                Err(CuratorError::RateLimitExceeded {
                    kind,
                    used,
                    max: limit,
                })
            }
        }
    }

    /// Hand back a reservation after a failed request
    pub async fn release(&self, mut reservation: Reservation) -> CuratorResult<()> {
        reservation.settled = true;
        if let Some(key) = reservation.key.take() {
            debug!("Releasing reservation {}", key);
            self.store.release(&key).await?;
        }
        Ok(())
    }

    /// Per-draft refinement ceiling
    pub fn check_draft_refinements(&self, draft: &PlaylistDraft) -> CuratorResult<()> {
        let max = self.config.max_refinements_per_playlist;
        if draft.refinement_count >= max {
            info!(
                "Draft {} reached its refinement cap ({}/{})",
                draft.id, draft.refinement_count, max
            );
            return Err(CuratorError::RateLimitExceeded {
                kind: LimitKind::Refinement,
                used: draft.refinement_count,
                max,
            });
        }
        Ok(())
    }

    /// Counters for `owner_key` on `day`; an absent record reads as zero
    pub async fn record(&self, owner_key: &str, day: NaiveDate) -> CuratorResult<RateLimitRecord> {
        let generation_count = self
            .store
            .get(&Self::counter_key(owner_key, LimitKind::Generation, day))
            .await?;
        let refinement_count = self
            .store
            .get(&Self::counter_key(owner_key, LimitKind::Refinement, day))
            .await?;

        Ok(RateLimitRecord {
            owner_key: owner_key.to_string(),
            day,
            generation_count,
            refinement_count,
        })
    }

    /// Read-only usage for today
    pub async fn status(&self, owner_key: &str) -> CuratorResult<RateLimitStatus> {
        self.status_on(owner_key, Utc::now().date_naive()).await
    }

    pub async fn status_on(&self, owner_key: &str, day: NaiveDate) -> CuratorResult<RateLimitStatus> {
        let record = self.record(owner_key, day).await?;

        Ok(RateLimitStatus {
            owner_key: record.owner_key,
            day,
            generations: KindUsage {
                used: record.generation_count,
                max: self.config.generation_limit,
                enabled: self.config.generation_enabled,
            },
            refinements: KindUsage {
                used: record.refinement_count,
                max: self.config.refinement_limit,
                enabled: self.config.refinement_enabled,
            },
        })
    }
}
