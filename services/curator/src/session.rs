//! Session lookup and gating
//!
//! Sessions are issued elsewhere (OAuth handshake, device registration).
//! This module only resolves them through a [`SessionProvider`] and decides
//! whether a request may proceed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::cache::RedisPool;
use common::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{CuratorError, CuratorResult};
use crate::models::{OperatingMode, ResolvedSession, Session};

/// Source of issued sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn lookup(&self, session_id: &str) -> StoreResult<Option<Session>>;
}

/// Sessions registered in process memory
#[derive(Debug, Clone, Default)]
pub struct MemorySessionProvider {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a session
    pub async fn insert(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn lookup(&self, session_id: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }
}

/// Sessions stored in Redis as JSON under `session:{id}`
#[derive(Clone)]
pub struct RedisSessionProvider {
    redis_pool: RedisPool,
}

impl RedisSessionProvider {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn session_key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }

    /// Store a session until its absolute expiry
    pub async fn store(&self, session: &Session) -> StoreResult<()> {
        info!("Storing session: {}", session.id);

        let payload = serde_json::to_string(session)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let ttl = (session.expires_at - Utc::now()).num_seconds().max(1) as u64;

        self.redis_pool
            .set(&Self::session_key(&session.id), &payload, Some(ttl))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for RedisSessionProvider {
    async fn lookup(&self, session_id: &str) -> StoreResult<Option<Session>> {
        let raw = self.redis_pool.get(&Self::session_key(session_id)).await?;

        raw.map(|payload| {
            serde_json::from_str::<Session>(&payload)
                .map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }
}

/// Read-only gate in front of every pipeline call
#[derive(Clone)]
pub struct SessionGate {
    provider: Arc<dyn SessionProvider>,
    mode: OperatingMode,
}

impl SessionGate {
    /// The mode is fixed for the lifetime of the gate
    pub fn new(provider: Arc<dyn SessionProvider>, mode: OperatingMode) -> Self {
        Self { provider, mode }
    }

    /// Validate a session against the current time
    pub async fn validate(&self, session_id: &str, device_id: &str) -> CuratorResult<ResolvedSession> {
        self.validate_at(session_id, device_id, Utc::now()).await
    }

    /// Validate a session as of `now`
    pub async fn validate_at(
        &self,
        session_id: &str,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> CuratorResult<ResolvedSession> {
        if session_id.trim().is_empty() || device_id.trim().is_empty() {
            return Err(CuratorError::SessionInvalid(
                "Session and device identifiers are required".to_string(),
            ));
        }

        let session = self
            .provider
            .lookup(session_id)
            .await?
            .ok_or_else(|| reject(session_id, "unknown session"))?;

        if session.is_expired_at(now) {
            return Err(reject(session_id, "session expired"));
        }

        if session.device_fingerprint != device_id {
            return Err(reject(session_id, "device mismatch"));
        }

        if session.mode != self.mode {
            return Err(reject(
                session_id,
                &format!("issued in {} mode, server runs {}", session.mode, self.mode),
            ));
        }

        let owner_key = match self.mode {
            OperatingMode::Isolated => session.device_fingerprint.clone(),
            OperatingMode::Synced => session
                .account_id
                .clone()
                .ok_or_else(|| reject(session_id, "synced session without account"))?,
        };

        Ok(ResolvedSession {
            session_id: session.id,
            mode: session.mode,
            account_ref: session.account_id,
            owner_key,
        })
    }
}

fn reject(session_id: &str, reason: &str) -> CuratorError {
    warn!("Rejecting session {}: {}", session_id, reason);
    CuratorError::SessionInvalid(reason.to_string())
}
