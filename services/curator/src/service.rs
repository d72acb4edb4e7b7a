//! Generation and refinement pipeline
//!
//! Every quota-consuming operation follows the same shape: reserve a slot,
//! run the pipeline, then commit the reservation on success or release it on
//! any failure, so a failed request never consumes quota.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::assembler::{AssemblyRequest, PlaylistAssembler};
use crate::catalog::CatalogSearchAdapter;
use crate::config::CuratorConfig;
use crate::error::{CuratorError, CuratorResult};
use crate::models::{
    CommitRequest, DraftResponse, GenerateRequest, LimitKind, PlaylistDraft, PlaylistResponse,
    RateLimitStatus, RefineRequest, ResolvedSession,
};
use crate::providers::{CatalogProvider, ProviderChain};
use crate::rate_limiter::{RateLimiter, RateLimiterConfig, Reservation};
use crate::refinement::{RefinementPlan, merge_prompt};
use crate::store::{CounterStore, DraftStore};
use crate::strategy::StrategyGenerator;
use crate::validation::{
    PromptValidator, validate_count, validate_discovery_weight, validate_feedback,
    validate_prompt_text,
};

type DraftLock = Arc<tokio::sync::Mutex<()>>;

/// The curator pipeline with its collaborators
pub struct CuratorService {
    count_bounds: (u32, u32),
    max_refinements: u32,
    replace_fraction: f32,
    rate_limiter: RateLimiter,
    validator: PromptValidator,
    strategist: StrategyGenerator,
    catalog: CatalogSearchAdapter,
    assembler: PlaylistAssembler,
    drafts: Arc<dyn DraftStore>,
    draft_locks: Mutex<HashMap<Uuid, DraftLock>>,
}

impl CuratorService {
    pub fn new(
        config: &CuratorConfig,
        ai: ProviderChain,
        catalog: Arc<dyn CatalogProvider>,
        counters: Arc<dyn CounterStore>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            count_bounds: config.count_bounds(),
            max_refinements: config.limits.max_refinements_per_playlist,
            replace_fraction: config.ranking.replace_fraction,
            rate_limiter: RateLimiter::new(RateLimiterConfig::from(&config.limits), counters),
            validator: PromptValidator::new(&config.validator, ai.clone()),
            strategist: StrategyGenerator::new(ai, &config.ranking),
            catalog: CatalogSearchAdapter::new(catalog, &config.catalog),
            assembler: PlaylistAssembler::new(&config.ranking),
            drafts,
            draft_locks: Mutex::new(HashMap::new()),
        }
    }

    /// In-process writer lock for one draft. Idle locks are pruned on access.
    fn draft_lock(&self, id: Uuid) -> DraftLock {
        let mut locks = match self.draft_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(id).or_default().clone()
    }

    /// Commit on success, release on failure
    async fn settle<T>(&self, reservation: Reservation, outcome: CuratorResult<T>) -> CuratorResult<T> {
        match outcome {
            Ok(value) => {
                reservation.commit();
                Ok(value)
            }
            Err(e) => {
                let kind = reservation.kind();
                if let Err(release_err) = self.rate_limiter.release(reservation).await {
                    error!("Failed to release {} reservation: {}", kind, release_err);
                }
                Err(e)
            }
        }
    }

    /// Load a draft the caller owns; anybody else's draft does not exist
    async fn owned_draft(&self, session: &ResolvedSession, id: Uuid) -> CuratorResult<PlaylistDraft> {
        match self.drafts.get(id).await? {
            Some(draft) if draft.owner_key == session.owner_key => Ok(draft),
            Some(_) => {
                warn!("Owner {} requested foreign draft {}", session.owner_key, id);
                Err(CuratorError::NotFound(format!("Draft {} not found", id)))
            }
            None => Err(CuratorError::NotFound(format!("Draft {} not found", id))),
        }
    }

    fn response(&self, draft: &PlaylistDraft, generated_from: String, is_refinement: bool) -> PlaylistResponse {
        let remaining = draft.remaining_refinements(self.max_refinements);
        PlaylistResponse {
            draft_id: draft.id,
            total: draft.tracks.len(),
            tracks: draft.tracks.clone(),
            generated_from,
            is_refinement,
            refinement_eligible: !draft.is_committed() && remaining > 0,
            remaining_refinements: is_refinement.then_some(remaining),
        }
    }

    /// Prompt to a new draft of exactly `count` tracks
    #[instrument(skip(self, session, request), fields(owner = %session.owner_key, count = request.count))]
    pub async fn generate(
        &self,
        session: &ResolvedSession,
        request: GenerateRequest,
    ) -> CuratorResult<PlaylistResponse> {
        validate_prompt_text(&request.prompt, self.validator.max_chars())
            .map_err(CuratorError::InvalidRequest)?;
        validate_count(request.count, self.count_bounds).map_err(CuratorError::InvalidRequest)?;
        validate_discovery_weight(request.discovery_weight).map_err(CuratorError::InvalidRequest)?;
        request.profile.validate().map_err(CuratorError::InvalidRequest)?;

        let reservation = self
            .rate_limiter
            .check_and_reserve(&session.owner_key, LimitKind::Generation)
            .await?;

        let outcome = self.run_generation(session, &request).await;
        let draft = self.settle(reservation, outcome).await?;

        info!(
            "Generated draft {} with {} tracks for {}",
            draft.id,
            draft.tracks.len(),
            session.owner_key
        );
        Ok(self.response(&draft, request.prompt.trim().to_string(), false))
    }

    async fn run_generation(
        &self,
        session: &ResolvedSession,
        request: &GenerateRequest,
    ) -> CuratorResult<PlaylistDraft> {
        let prompt = request.prompt.trim();
        self.validator.validate(prompt).await?;

        let strategy = self
            .strategist
            .generate(prompt, &request.profile, request.count, request.discovery_weight)
            .await?;

        let exclude = HashSet::new();
        let tracks = self
            .assembler
            .assemble(
                &self.catalog,
                &AssemblyRequest {
                    strategy: &strategy,
                    profile: &request.profile,
                    count: request.count as usize,
                    exclude: &exclude,
                    keep: &[],
                },
            )
            .await?;

        let draft = PlaylistDraft::new(&session.owner_key, &session.session_id, prompt, tracks);
        self.drafts.insert(&draft).await?;
        Ok(draft)
    }

    /// Feedback-driven revision of an existing draft.
    ///
    /// Writers on the same draft queue on its lock; a write that lost a race
    /// with another process is rejected as a conflict.
    #[instrument(skip(self, session, request), fields(owner = %session.owner_key))]
    pub async fn refine(
        &self,
        session: &ResolvedSession,
        draft_id: Uuid,
        request: RefineRequest,
    ) -> CuratorResult<PlaylistResponse> {
        validate_feedback(&request.feedback, self.validator.max_chars())
            .map_err(CuratorError::InvalidRequest)?;
        if let Some(count) = request.count {
            validate_count(count, self.count_bounds).map_err(CuratorError::InvalidRequest)?;
        }
        request.profile.validate().map_err(CuratorError::InvalidRequest)?;

        let lock = self.draft_lock(draft_id);
        let _guard = lock.lock().await;

        let draft = self.owned_draft(session, draft_id).await?;
        if draft.is_committed() {
            return Err(CuratorError::Conflict(format!(
                "Draft {} is committed and can no longer be refined",
                draft_id
            )));
        }
        self.rate_limiter.check_draft_refinements(&draft)?;

        let reservation = self
            .rate_limiter
            .check_and_reserve(&session.owner_key, LimitKind::Refinement)
            .await?;

        let merged = merge_prompt(&draft.prompt, &request.feedback);
        let outcome = self.run_refinement(&draft, &merged, &request).await;
        let refined = self.settle(reservation, outcome).await?;

        info!(
            "Refined draft {} ({}/{} refinements used)",
            refined.id, refined.refinement_count, self.max_refinements
        );
        Ok(self.response(&refined, merged, true))
    }

    async fn run_refinement(
        &self,
        draft: &PlaylistDraft,
        merged: &str,
        request: &RefineRequest,
    ) -> CuratorResult<PlaylistDraft> {
        let target = request
            .count
            .map(|c| c as usize)
            .unwrap_or(draft.tracks.len());
        let plan = RefinementPlan::build(draft, &request.feedback, target, self.replace_fraction);
        info!(
            intent = plan.intent.as_str(),
            keep = plan.keep.len(),
            fetch = plan.fetch,
            "Planned refinement of draft {}",
            draft.id
        );

        let mut tracks = plan.keep.clone();
        if plan.fetch > 0 {
            let strategy = self
                .strategist
                .generate(merged, &request.profile, plan.fetch as u32, None)
                .await?;
            let fresh = self
                .assembler
                .assemble(
                    &self.catalog,
                    &AssemblyRequest {
                        strategy: &strategy,
                        profile: &request.profile,
                        count: plan.fetch,
                        exclude: &plan.exclude,
                        keep: &plan.keep,
                    },
                )
                .await?;
            tracks.extend(fresh);
        }

        let refined = draft.refined(tracks);
        if !self.drafts.update_if_version(&refined, draft.version).await? {
            return Err(CuratorError::Conflict(format!(
                "Draft {} was modified concurrently",
                draft.id
            )));
        }
        Ok(refined)
    }

    pub async fn get_draft(&self, session: &ResolvedSession, id: Uuid) -> CuratorResult<DraftResponse> {
        let draft = self.owned_draft(session, id).await?;
        Ok(DraftResponse {
            remaining_refinements: draft.remaining_refinements(self.max_refinements),
            draft,
        })
    }

    /// Mark a draft as pushed to the external catalog. Terminal.
    pub async fn commit_draft(
        &self,
        session: &ResolvedSession,
        id: Uuid,
        request: CommitRequest,
    ) -> CuratorResult<DraftResponse> {
        let external_id = request.external_playlist_id.trim();
        if external_id.is_empty() {
            return Err(CuratorError::InvalidRequest(
                "External playlist id is required".to_string(),
            ));
        }

        let lock = self.draft_lock(id);
        let _guard = lock.lock().await;

        let draft = self.owned_draft(session, id).await?;
        let committed = draft
            .committed(external_id)
            .ok_or_else(|| CuratorError::Conflict(format!("Draft {} is already committed", id)))?;

        if !self.drafts.update_if_version(&committed, draft.version).await? {
            return Err(CuratorError::Conflict(format!(
                "Draft {} was modified concurrently",
                id
            )));
        }

        info!("Committed draft {} as {}", id, external_id);
        Ok(DraftResponse {
            remaining_refinements: 0,
            draft: committed,
        })
    }

    pub async fn delete_draft(&self, session: &ResolvedSession, id: Uuid) -> CuratorResult<()> {
        let lock = self.draft_lock(id);
        let _guard = lock.lock().await;

        self.owned_draft(session, id).await?;
        if !self.drafts.delete(id).await? {
            return Err(CuratorError::NotFound(format!("Draft {} not found", id)));
        }
        info!("Deleted draft {}", id);
        Ok(())
    }

    pub async fn rate_limit_status(&self, session: &ResolvedSession) -> CuratorResult<RateLimitStatus> {
        self.rate_limiter.status(&session.owner_key).await
    }
}
