//! In-process store backends for single-node deployments and tests

use async_trait::async_trait;
use common::error::StoreResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{CounterStore, DraftStore};
use crate::models::PlaylistDraft;

/// Counters held in a mutex-guarded map
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<Mutex<HashMap<String, u32>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> StoreResult<u32> {
        let counters = self.counters.lock().await;
        Ok(counters.get(key).copied().unwrap_or(0))
    }

    async fn increment_with_ceiling(&self, key: &str, ceiling: u32) -> StoreResult<Option<u32>> {
        let mut counters = self.counters.lock().await;
        let entry = counters.entry(key.to_string()).or_insert(0);

        if *entry >= ceiling {
            return Ok(None);
        }

        *entry += 1;
        Ok(Some(*entry))
    }

    async fn release(&self, key: &str) -> StoreResult<()> {
        let mut counters = self.counters.lock().await;
        if let Some(entry) = counters.get_mut(key) {
            *entry = entry.saturating_sub(1);
        }
        Ok(())
    }
}

/// Drafts held in a map
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    drafts: Arc<RwLock<HashMap<Uuid, PlaylistDraft>>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<PlaylistDraft>> {
        Ok(self.drafts.read().await.get(&id).cloned())
    }

    async fn insert(&self, draft: &PlaylistDraft) -> StoreResult<()> {
        self.drafts.write().await.insert(draft.id, draft.clone());
        Ok(())
    }

    async fn update_if_version(
        &self,
        draft: &PlaylistDraft,
        expected_version: i64,
    ) -> StoreResult<bool> {
        let mut drafts = self.drafts.write().await;
        match drafts.get_mut(&draft.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = draft.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.drafts.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter_stops_at_ceiling() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment_with_ceiling("k", 2).await.unwrap(), Some(1));
        assert_eq!(store.increment_with_ceiling("k", 2).await.unwrap(), Some(2));
        assert_eq!(store.increment_with_ceiling("k", 2).await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_release_never_underflows() {
        let store = MemoryCounterStore::new();
        store.release("missing").await.unwrap();
        assert_eq!(store.get("missing").await.unwrap(), 0);

        store.increment_with_ceiling("k", 5).await.unwrap();
        store.release("k").await.unwrap();
        store.release("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_requires_matching_version() {
        let store = MemoryDraftStore::new();
        let draft = PlaylistDraft::new("owner", "session", "late night drive", vec![]);
        store.insert(&draft).await.unwrap();

        let next = draft.refined(vec![]);
        assert!(store.update_if_version(&next, draft.version).await.unwrap());

        let stale = draft.refined(vec![]);
        assert!(!store.update_if_version(&stale, draft.version).await.unwrap());

        let stored = store.get(draft.id).await.unwrap().unwrap();
        assert_eq!(stored.version, next.version);
        assert_eq!(stored.refinement_count, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryDraftStore::new();
        let draft = PlaylistDraft::new("owner", "session", "sunday brunch", vec![]);
        store.insert(&draft).await.unwrap();

        assert!(store.delete(draft.id).await.unwrap());
        assert!(!store.delete(draft.id).await.unwrap());
        assert!(store.get(draft.id).await.unwrap().is_none());
    }
}
