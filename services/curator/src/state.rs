//! Application state shared across handlers

use anyhow::Result;
use common::cache::{RedisConfig, RedisPool};
use common::database::{DatabaseConfig, health_check, init_pool};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::config::{CatalogKind, CuratorConfig, DraftBackend, StoreBackend};
use crate::models::OperatingMode;
use crate::providers::{CatalogProvider, ProviderChain, SpotifyCatalog};
use crate::service::CuratorService;
use crate::session::{MemorySessionProvider, RedisSessionProvider, SessionGate, SessionProvider};
use crate::store::{
    CounterStore, DraftStore, MemoryCounterStore, MemoryDraftStore, PgDraftStore,
    RedisCounterStore,
};

/// What `/health` reports about the running configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub mode: OperatingMode,
    pub ai_providers: Vec<String>,
    pub catalog: String,
    pub counter_store: &'static str,
    pub draft_store: &'static str,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CuratorService>,
    pub session_gate: SessionGate,
    pub info: Arc<ServiceInfo>,
}

impl AppState {
    /// Wire a state from already-built collaborators
    pub fn new(
        config: &CuratorConfig,
        ai: ProviderChain,
        catalog: Arc<dyn CatalogProvider>,
        counters: Arc<dyn CounterStore>,
        drafts: Arc<dyn DraftStore>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        let info = ServiceInfo {
            mode: config.server.mode,
            ai_providers: ai.provider_names(),
            catalog: catalog.name().to_string(),
            counter_store: match config.store.backend {
                StoreBackend::Memory => "memory",
                StoreBackend::Redis => "redis",
            },
            draft_store: match config.store.draft_backend {
                DraftBackend::Memory => "memory",
                DraftBackend::Postgres => "postgres",
            },
        };

        Self {
            service: Arc::new(CuratorService::new(config, ai, catalog, counters, drafts)),
            session_gate: SessionGate::new(sessions, config.server.mode),
            info: Arc::new(info),
        }
    }

    /// Build every backend the configuration names
    pub async fn from_config(config: &CuratorConfig) -> Result<Self> {
        let ai = ProviderChain::from_config(&config.ai)?;

        let catalog: Arc<dyn CatalogProvider> = match config.catalog.kind {
            CatalogKind::Spotify => Arc::new(SpotifyCatalog::new(&config.catalog)?),
        };

        let (counters, sessions): (Arc<dyn CounterStore>, Arc<dyn SessionProvider>) =
            match config.store.backend {
                StoreBackend::Memory => {
                    info!("Using in-memory counters and sessions");
                    (
                        Arc::new(MemoryCounterStore::new()),
                        Arc::new(MemorySessionProvider::new()),
                    )
                }
                StoreBackend::Redis => {
                    let redis_pool = RedisPool::new(&RedisConfig {
                        url: config.store.redis_url.clone(),
                        max_connections: config.store.max_connections,
                    })
                    .await?;

                    if !redis_pool.health_check().await? {
                        anyhow::bail!("Failed to connect to Redis");
                    }
                    info!("Redis connection successful");

                    (
                        Arc::new(RedisCounterStore::new(redis_pool.clone())),
                        Arc::new(RedisSessionProvider::new(redis_pool)),
                    )
                }
            };

        let drafts: Arc<dyn DraftStore> = match config.store.draft_backend {
            DraftBackend::Memory => {
                info!("Using in-memory draft store");
                Arc::new(MemoryDraftStore::new())
            }
            DraftBackend::Postgres => {
                let db_config =
                    DatabaseConfig::new(&config.store.database_url, config.store.max_connections);
                let pool = init_pool(&db_config).await?;

                if health_check(&pool).await? {
                    info!("Database connection successful");
                } else {
                    anyhow::bail!("Failed to connect to database");
                }

                let store = PgDraftStore::new(pool);
                store.ensure_schema().await?;
                Arc::new(store)
            }
        };

        Ok(Self::new(config, ai, catalog, counters, drafts, sessions))
    }
}
