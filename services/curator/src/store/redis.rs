//! Redis-backed counters

use async_trait::async_trait;
use common::cache::RedisPool;
use common::error::StoreResult;

use super::CounterStore;

/// Counter keys outlive their calendar day by a day, then expire.
pub const COUNTER_TTL_SECONDS: u64 = 48 * 3600;

/// Counters stored in Redis, incremented through a Lua script
#[derive(Clone)]
pub struct RedisCounterStore {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisCounterStore {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            ttl_seconds: COUNTER_TTL_SECONDS,
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> StoreResult<u32> {
        Ok(self.pool.get_counter(key).await?)
    }

    async fn increment_with_ceiling(&self, key: &str, ceiling: u32) -> StoreResult<Option<u32>> {
        Ok(self
            .pool
            .incr_with_ceiling(key, ceiling, self.ttl_seconds)
            .await?)
    }

    async fn release(&self, key: &str) -> StoreResult<()> {
        self.pool.decr_floored(key).await?;
        Ok(())
    }
}
