//! End-to-end scenarios over the full pipeline with in-process fakes


use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CuratorConfig;
use crate::error::CuratorError;
use crate::mock::{MockAiProvider, MockCatalog};
use crate::models::{
    CommitRequest, GenerateRequest, LimitKind, OperatingMode, RefineRequest, ResolvedSession,
    Session, UserPreferenceProfile,
};
use crate::providers::{AiProvider, ProviderChain};
use crate::session::MemorySessionProvider;
use crate::state::AppState;
use crate::store::{MemoryCounterStore, MemoryDraftStore};

const WORKOUT_PROMPT: &str = "upbeat indie rock for a morning workout";

struct Harness {
    state: AppState,
    ai: Arc<MockAiProvider>,
    catalog: Arc<MockCatalog>,
    sessions: Arc<MemorySessionProvider>,
}

impl Harness {
    fn new(config: CuratorConfig, ai: MockAiProvider, catalog: MockCatalog) -> Self {
        let ai = Arc::new(ai);
        let catalog = Arc::new(catalog);
        let sessions = Arc::new(MemorySessionProvider::new());
        let chain = ProviderChain::new(
            vec![ai.clone() as Arc<dyn AiProvider>],
            Duration::from_secs(2),
        );

        let state = AppState::new(
            &config,
            chain,
            catalog.clone(),
            Arc::new(MemoryCounterStore::new()),
            Arc::new(MemoryDraftStore::new()),
            sessions.clone(),
        );

        Self {
            state,
            ai,
            catalog,
            sessions,
        }
    }

    fn standard() -> Self {
        Self::new(
            CuratorConfig::default(),
            MockAiProvider::new("ai"),
            MockCatalog::with_tracks(200).varied(),
        )
    }

    /// Register an isolated-mode session bound to `device`
    async fn register(&self, session_id: &str, device: &str, mode: OperatingMode) {
        let now = Utc::now();
        self.sessions
            .insert(Session {
                id: session_id.to_string(),
                device_fingerprint: device.to_string(),
                mode,
                created_at: now,
                expires_at: now + ChronoDuration::hours(1),
                account_id: (mode == OperatingMode::Synced).then(|| "acct-1".to_string()),
            })
            .await;
    }
}

fn owner(device: &str) -> ResolvedSession {
    ResolvedSession {
        session_id: format!("session-{}", device),
        mode: OperatingMode::Isolated,
        account_ref: None,
        owner_key: device.to_string(),
    }
}

fn generate_request(prompt: &str, count: u32) -> GenerateRequest {
    GenerateRequest {
        prompt: prompt.to_string(),
        count,
        profile: UserPreferenceProfile::default(),
        discovery_weight: None,
    }
}

fn refine_request(feedback: &str, count: Option<u32>) -> RefineRequest {
    RefineRequest {
        feedback: feedback.to_string(),
        count,
        profile: UserPreferenceProfile::default(),
    }
}

fn distinct_ids(tracks: &[crate::models::Track]) -> HashSet<String> {
    tracks.iter().map(|t| t.id.clone()).collect()
}

#[tokio::test]
async fn test_generate_workout_playlist() {
    let harness = Harness::standard();
    let session = owner("device-1");

    let response = harness
        .state
        .service
        .generate(&session, generate_request(WORKOUT_PROMPT, 10))
        .await
        .unwrap();

    assert_eq!(response.tracks.len(), 10);
    assert_eq!(response.total, 10);
    assert_eq!(distinct_ids(&response.tracks).len(), 10);
    assert_eq!(response.generated_from, WORKOUT_PROMPT);
    assert!(!response.is_refinement);
    assert!(response.refinement_eligible);
    assert_eq!(response.remaining_refinements, None);

    let status = harness.state.service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 1);
    assert_eq!(status.refinements.used, 0);
}

#[tokio::test]
async fn test_refine_makes_it_more_energetic() {
    let harness = Harness::standard();
    let session = owner("device-1");
    let service = &harness.state.service;

    let generated = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 10))
        .await
        .unwrap();

    let refined = service
        .refine(
            &session,
            generated.draft_id,
            refine_request("make it more energetic", Some(10)),
        )
        .await
        .unwrap();

    assert_eq!(refined.tracks.len(), 10);
    assert_eq!(distinct_ids(&refined.tracks).len(), 10);
    assert!(refined.is_refinement);
    assert_eq!(refined.remaining_refinements, Some(2));
    assert!(refined.generated_from.contains("make it more energetic"));

    let draft = service.get_draft(&session, generated.draft_id).await.unwrap();
    assert_eq!(draft.draft.refinement_count, 1);
    assert_eq!(draft.remaining_refinements, 2);
    assert_eq!(draft.draft.tracks, refined.tracks);

    let prompts = harness.ai.prompts();
    assert!(
        prompts
            .last()
            .unwrap()
            .contains("Refinement: make it more energetic")
    );
}

#[tokio::test]
async fn test_draft_accepts_exactly_max_refinements() {
    let harness = Harness::standard();
    let session = owner("device-1");
    let service = &harness.state.service;

    let draft_id = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 10))
        .await
        .unwrap()
        .draft_id;

    for expected in 1..=3u32 {
        let refined = service
            .refine(&session, draft_id, refine_request("more dreamy", None))
            .await
            .unwrap();
        assert_eq!(refined.remaining_refinements, Some(3 - expected));

        let stored = service.get_draft(&session, draft_id).await.unwrap().draft;
        assert_eq!(stored.refinement_count, expected);
        assert_eq!(stored.tracks, refined.tracks);
    }

    let err = service
        .refine(&session, draft_id, refine_request("more dreamy", None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CuratorError::RateLimitExceeded {
            kind: LimitKind::Refinement,
            used: 3,
            max: 3
        }
    ));

    // rejected attempt consumed no daily quota
    let status = service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.refinements.used, 3);
}

#[tokio::test]
async fn test_replace_refinement_excludes_previous_tracks() {
    let harness = Harness::standard();
    let session = owner("device-1");
    let service = &harness.state.service;

    let generated = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 10))
        .await
        .unwrap();
    let before = distinct_ids(&generated.tracks);

    let refined = service
        .refine(
            &session,
            generated.draft_id,
            refine_request("replace the slow ones", None),
        )
        .await
        .unwrap();

    let after = distinct_ids(&refined.tracks);
    assert_eq!(after.len(), 10);
    // half of the list is swapped for tracks not seen before
    assert_eq!(after.intersection(&before).count(), 5);
    assert_eq!(refined.tracks[..5], generated.tracks[..5]);
}

#[tokio::test]
async fn test_generation_limit_then_reject() {
    let mut config = CuratorConfig::default();
    config.limits.generation_limit = 2;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai"),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");
    let service = &harness.state.service;

    for _ in 0..2 {
        service
            .generate(&session, generate_request(WORKOUT_PROMPT, 5))
            .await
            .unwrap();
    }

    let err = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CuratorError::RateLimitExceeded {
            kind: LimitKind::Generation,
            used: 2,
            max: 2
        }
    ));

    // another owner has its own quota
    service
        .generate(&owner("device-2"), generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_generations_with_one_slot_left() {
    let mut config = CuratorConfig::default();
    config.limits.generation_limit = 1;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai").with_delay(Duration::from_millis(20)),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");
    let service = &harness.state.service;

    let (a, b) = tokio::join!(
        service.generate(&session, generate_request(WORKOUT_PROMPT, 5)),
        service.generate(&session, generate_request(WORKOUT_PROMPT, 5)),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(CuratorError::RateLimitExceeded { .. })))
    );
}

#[tokio::test]
async fn test_disabled_generation_limit_never_blocks() {
    let mut config = CuratorConfig::default();
    config.limits.generation_limit = 1;
    config.limits.generation_enabled = false;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai"),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");

    for _ in 0..3 {
        harness
            .state
            .service
            .generate(&session, generate_request(WORKOUT_PROMPT, 5))
            .await
            .unwrap();
    }

    let status = harness.state.service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 0);
    assert!(!status.generations.enabled);
}

#[tokio::test]
async fn test_off_topic_prompt_never_reaches_strategy() {
    let harness = Harness::new(
        CuratorConfig::default(),
        MockAiProvider::new("ai").with_similarity(0.2),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");

    let err = harness
        .state
        .service
        .generate(&session, generate_request("what is the capital of France", 10))
        .await
        .unwrap_err();

    assert!(matches!(err, CuratorError::ValidationFailed { .. }));
    assert_eq!(harness.ai.similarity_calls(), 1);
    assert_eq!(harness.ai.strategy_calls(), 0);
    assert!(harness.catalog.queries().is_empty());

    let status = harness.state.service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 0);
}

#[tokio::test]
async fn test_upstream_failure_releases_quota() {
    let mut config = CuratorConfig::default();
    config.limits.generation_limit = 1;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai"),
        MockCatalog::with_tracks(200).varied().failing_on(""),
    );
    let session = owner("device-1");

    for _ in 0..2 {
        let err = harness
            .state
            .service
            .generate(&session, generate_request(WORKOUT_PROMPT, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, CuratorError::UpstreamUnavailable(_)));
    }

    let status = harness.state.service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 0);
}

#[tokio::test]
async fn test_small_catalog_reports_shortfall() {
    let harness = Harness::new(
        CuratorConfig::default(),
        MockAiProvider::new("ai"),
        MockCatalog::with_tracks(7),
    );

    let err = harness
        .state
        .service
        .generate(&owner("device-1"), generate_request(WORKOUT_PROMPT, 10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CuratorError::InsufficientResults {
            requested: 10,
            achieved: 7
        }
    ));
}

#[tokio::test]
async fn test_count_outside_bounds_is_invalid() {
    let harness = Harness::standard();
    let session = owner("device-1");

    for count in [4, 26] {
        let err = harness
            .state
            .service
            .generate(&session, generate_request(WORKOUT_PROMPT, count))
            .await
            .unwrap_err();
        assert!(matches!(err, CuratorError::InvalidRequest(_)));
    }
    assert_eq!(harness.ai.similarity_calls(), 0);
}

#[tokio::test]
async fn test_debug_mode_allows_larger_playlists() {
    let mut config = CuratorConfig::default();
    config.server.debug = true;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai"),
        MockCatalog::with_tracks(400).varied(),
    );

    let response = harness
        .state
        .service
        .generate(&owner("device-1"), generate_request(WORKOUT_PROMPT, 40))
        .await
        .unwrap();
    assert_eq!(response.tracks.len(), 40);
}

#[tokio::test]
async fn test_commit_is_terminal() {
    let harness = Harness::standard();
    let session = owner("device-1");
    let service = &harness.state.service;

    let draft_id = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap()
        .draft_id;

    let committed = service
        .commit_draft(
            &session,
            draft_id,
            CommitRequest {
                external_playlist_id: "spotify:playlist:abc".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        committed.draft.external_playlist_id.as_deref(),
        Some("spotify:playlist:abc")
    );

    let refine_err = service
        .refine(&session, draft_id, refine_request("more dreamy", None))
        .await
        .unwrap_err();
    assert!(matches!(refine_err, CuratorError::Conflict(_)));

    let commit_err = service
        .commit_draft(
            &session,
            draft_id,
            CommitRequest {
                external_playlist_id: "other".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(commit_err, CuratorError::Conflict(_)));

    // refusing a committed draft costs no refinement quota
    let status = service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.refinements.used, 0);
}

#[tokio::test]
async fn test_drafts_are_private_to_their_owner() {
    let harness = Harness::standard();
    let service = &harness.state.service;

    let draft_id = service
        .generate(&owner("device-1"), generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap()
        .draft_id;

    let intruder = owner("device-2");
    assert!(matches!(
        service.get_draft(&intruder, draft_id).await,
        Err(CuratorError::NotFound(_))
    ));
    assert!(matches!(
        service
            .refine(&intruder, draft_id, refine_request("more dreamy", None))
            .await,
        Err(CuratorError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_draft(&intruder, draft_id).await,
        Err(CuratorError::NotFound(_))
    ));
    assert!(service.get_draft(&owner("device-1"), draft_id).await.is_ok());
}

#[tokio::test]
async fn test_delete_removes_draft() {
    let harness = Harness::standard();
    let session = owner("device-1");
    let service = &harness.state.service;

    let draft_id = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap()
        .draft_id;

    service.delete_draft(&session, draft_id).await.unwrap();
    assert!(matches!(
        service.get_draft(&session, draft_id).await,
        Err(CuratorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_refinements_are_serialized_per_draft() {
    let mut config = CuratorConfig::default();
    config.limits.max_refinements_per_playlist = 1;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai").with_delay(Duration::from_millis(20)),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");
    let service = &harness.state.service;

    let draft_id = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap()
        .draft_id;

    let (a, b) = tokio::join!(
        service.refine(&session, draft_id, refine_request("more dreamy", None)),
        service.refine(&session, draft_id, refine_request("more dreamy", None)),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(CuratorError::RateLimitExceeded {
            kind: LimitKind::Refinement,
            ..
        })
    )));

    let stored = service.get_draft(&session, draft_id).await.unwrap().draft;
    assert_eq!(stored.refinement_count, 1);
    let status = service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.refinements.used, 1);
}

#[tokio::test]
async fn test_disliked_artists_never_appear() {
    let harness = Harness::standard();
    let profile = UserPreferenceProfile {
        disliked_artists: (0..5).map(|i| format!("Artist {}", i)).collect(),
        ..Default::default()
    };

    let response = harness
        .state
        .service
        .generate(
            &owner("device-1"),
            GenerateRequest {
                profile: profile.clone(),
                ..generate_request(WORKOUT_PROMPT, 10)
            },
        )
        .await
        .unwrap();

    assert!(response.tracks.iter().all(|t| !profile.is_disliked(&t.artist)));
}

#[tokio::test]
async fn test_out_of_range_profile_decade_is_invalid() {
    let harness = Harness::new(
        CuratorConfig::default(),
        MockAiProvider::new("ai").with_completion(
            r#"{"genres": ["rock"], "moods": ["upbeat"], "energy": 0.8, "valence": 0.7, "novelty_weight": 0.3}"#,
        ),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");
    let profile = UserPreferenceProfile {
        decades: vec![65530],
        ..Default::default()
    };

    let err = harness
        .state
        .service
        .generate(
            &session,
            GenerateRequest {
                profile,
                ..generate_request(WORKOUT_PROMPT, 10)
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CuratorError::InvalidRequest(_)));
    assert_eq!(harness.ai.strategy_calls(), 0);
    assert!(harness.catalog.queries().is_empty());
    let status = harness.state.service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 0);
}

#[tokio::test]
async fn test_invalid_discovery_weight_consumes_no_quota() {
    let harness = Harness::standard();
    let session = owner("device-1");

    for weight in [1.5, -0.2, f32::NAN] {
        let err = harness
            .state
            .service
            .generate(
                &session,
                GenerateRequest {
                    discovery_weight: Some(weight),
                    ..generate_request(WORKOUT_PROMPT, 10)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CuratorError::InvalidRequest(_)));
    }

    assert_eq!(harness.ai.similarity_calls(), 0);
    let status = harness.state.service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 0);
}

#[tokio::test]
async fn test_cancelled_generation_gives_its_slot_back() {
    let mut config = CuratorConfig::default();
    config.limits.generation_limit = 1;
    let harness = Harness::new(
        config,
        MockAiProvider::new("ai").with_delay(Duration::from_millis(500)),
        MockCatalog::with_tracks(200).varied(),
    );
    let session = owner("device-1");
    let service = &harness.state.service;

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        service.generate(&session, generate_request(WORKOUT_PROMPT, 5)),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(harness.ai.strategy_calls(), 1);

    // the abandoned slot is released on a spawned task
    tokio::time::sleep(Duration::from_millis(20)).await;
    let status = service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 0);

    service
        .generate(&session, generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap();
    let status = service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.generations.used, 1);
}

#[tokio::test]
async fn test_failed_refinement_leaves_draft_and_quota_untouched() {
    let harness = Harness::new(
        CuratorConfig::default(),
        MockAiProvider::new("ai"),
        MockCatalog::with_tracks(7),
    );
    let session = owner("device-1");
    let service = &harness.state.service;

    let generated = service
        .generate(&session, generate_request(WORKOUT_PROMPT, 5))
        .await
        .unwrap();
    let before = service.get_draft(&session, generated.draft_id).await.unwrap().draft;
    let searched = harness.catalog.queries().len();

    // replacing excludes every current track, leaving too few candidates
    let err = service
        .refine(
            &session,
            generated.draft_id,
            refine_request("replace the slow ones", Some(5)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CuratorError::InsufficientResults { .. }));
    assert!(harness.catalog.queries().len() > searched);

    let after = service.get_draft(&session, generated.draft_id).await.unwrap();
    assert_eq!(after.draft.refinement_count, 0);
    assert_eq!(after.draft.version, before.version);
    assert_eq!(after.draft.tracks, before.tracks);
    assert_eq!(after.remaining_refinements, 3);

    let status = service.rate_limit_status(&session).await.unwrap();
    assert_eq!(status.refinements.used, 0);
    assert_eq!(status.generations.used, 1);
}
