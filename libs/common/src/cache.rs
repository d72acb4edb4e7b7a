//! Redis cache module for the Curator services
//!
//! This module provides functionality for connecting to Redis and performing
//! basic cache operations like get and set with TTL support, plus the atomic
//! counter primitives used for daily quotas.

use anyhow::Result;
use redis::{AsyncCommands, Client, Script};
use tracing::info;

/// Increments a counter only while it is below the ceiling.
///
/// Returns the new value, or -1 when the ceiling was already reached.
const INCR_WITH_CEILING: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
    return -1
end
current = redis.call('INCR', KEYS[1])
if tonumber(ARGV[2]) > 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return current
"#;

/// Decrements a counter without letting it drop below zero.
const DECR_FLOORED: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current <= 0 then
    return 0
end
return redis.call('DECR', KEYS[1])
"#;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let max_connections = std::env::var("REDIS_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        Ok(RedisConfig {
            url,
            max_connections,
        })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn.set_ex(key, value, ttl).await?;
        } else {
            let _: () = conn.set(key, value).await?;
        }

        Ok(())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Read an integer counter, treating a missing key as zero
    pub async fn get_counter(&self, key: &str) -> Result<u32> {
        let mut conn = self.get_connection().await?;
        let value: Option<u32> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    /// Atomically increment a counter unless it already reached `ceiling`
    ///
    /// Returns `Some(new_value)` on success and `None` when the ceiling was hit.
    /// The key's TTL is refreshed on every successful increment.
    pub async fn incr_with_ceiling(
        &self,
        key: &str,
        ceiling: u32,
        ttl_seconds: u64,
    ) -> Result<Option<u32>> {
        let mut conn = self.get_connection().await?;
        let result: i64 = Script::new(INCR_WITH_CEILING)
            .key(key)
            .arg(ceiling)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;

        if result < 0 {
            Ok(None)
        } else {
            Ok(Some(result as u32))
        }
    }

    /// Atomically decrement a counter, never going below zero
    pub async fn decr_floored(&self, key: &str) -> Result<u32> {
        let mut conn = self.get_connection().await?;
        let result: i64 = Script::new(DECR_FLOORED)
            .key(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(result.max(0) as u32)
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
