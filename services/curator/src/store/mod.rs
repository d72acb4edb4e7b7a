//! Narrow persistence interfaces
//!
//! The pipeline only ever talks to these traits; concrete backends are
//! picked at start-up from [`crate::config::StoreConfig`].

use async_trait::async_trait;
use common::error::StoreResult;
use uuid::Uuid;

use crate::models::PlaylistDraft;

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::{MemoryCounterStore, MemoryDraftStore};
pub use postgres::PgDraftStore;
pub use redis::RedisCounterStore;

/// Integer counters with an atomic bounded increment
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value; a missing key reads as zero
    async fn get(&self, key: &str) -> StoreResult<u32>;

    /// Increment only while the value is below `ceiling`.
    ///
    /// Returns the new value, or `None` when no slot was left. Concurrent
    /// callers on the same key never both take the last slot.
    async fn increment_with_ceiling(&self, key: &str, ceiling: u32) -> StoreResult<Option<u32>>;

    /// Give back one slot taken by `increment_with_ceiling`
    async fn release(&self, key: &str) -> StoreResult<()>;
}

/// Draft persistence keyed by draft id
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<PlaylistDraft>>;

    async fn insert(&self, draft: &PlaylistDraft) -> StoreResult<()>;

    /// Replace the stored draft only if its version still equals
    /// `expected_version`. Returns `false` when another writer got there first.
    async fn update_if_version(
        &self,
        draft: &PlaylistDraft,
        expected_version: i64,
    ) -> StoreResult<bool>;

    /// Returns `false` when nothing was deleted
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}
