//! Redis-backed caching layer for feed results
//!
//! Three accessors share one key-value store:
//! - Home feed (per user) - TTL: 1 minute
//! - Explore feed (per user) - TTL: 1 minute
//! - Popular feed (global) - TTL: 24 hours, overwritten hourly by the refresher
//!
//! Values are JSON arrays of posts in feed order.

mod feed_cache;
mod keys;

pub use feed_cache::{
    CacheLookup, CacheSlot, ExploreFeedCache, FeedCacheAccessor, FeedCaches, HomeFeedCache,
    PopularFeedCache,
};
pub use keys::CacheKey;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};

/// Home feed TTL (1 minute)
pub const HOME_FEED_TTL: Duration = Duration::from_secs(60);

/// Explore feed TTL (1 minute)
pub const EXPLORE_FEED_TTL: Duration = Duration::from_secs(60);

/// Popular feed TTL (24 hours)
pub const POPULAR_FEED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub home_ttl: Duration,
    pub explore_ttl: Duration,
    pub popular_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            home_ttl: HOME_FEED_TTL,
            explore_ttl: EXPLORE_FEED_TTL,
            popular_ttl: POPULAR_FEED_TTL,
        }
    }
}

/// Raw key-value store with per-key TTL.
///
/// Implementations must be safe for concurrent use; the engine shares one
/// store between request handlers and the background refresher.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Raw value under `key`, `None` when the key is absent
    async fn get(&self, key: &str) -> FeedResult<Option<String>>;

    /// Store `value` under `key`, overwriting any previous value
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> FeedResult<()>;

    async fn del(&self, key: &str) -> FeedResult<()>;
}

/// Redis implementation of [`CacheStore`]
#[derive(Clone)]
pub struct RedisCacheStore {
    client: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str) -> FeedResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            FeedError::CacheUnavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            FeedError::CacheUnavailable(format!("Failed to create Redis connection: {}", e))
        })?;

        Ok(Self { client: manager })
    }

    /// Ping Redis to check connection health
    pub async fn ping(&self) -> FeedResult<String> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                FeedError::CacheUnavailable(format!("Redis health check failed: {}", e))
            })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> FeedResult<Option<String>> {
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut self.client.clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", key, e);
                FeedError::from(e)
            })
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> FeedResult<()> {
        // SETEX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<_, ()>(&mut self.client.clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", key, e);
                FeedError::from(e)
            })?;

        debug!("Cached {} with TTL={}s", key, ttl_secs);
        Ok(())
    }

    async fn del(&self, key: &str) -> FeedResult<()> {
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut self.client.clone())
            .await
            .map_err(|e| {
                warn!("Redis DEL failed for {}: {}", key, e);
                FeedError::from(e)
            })?;

        debug!("Deleted cache entry {}", key);
        Ok(())
    }
}
