use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CacheConfig, CacheKey, CacheStore};
use crate::error::{FeedError, FeedResult};
use crate::metrics;
use crate::models::{FeedKind, Post};

/// Outcome of a cache read.
///
/// An absent key and a key holding an empty feed are different states: the
/// latter is a valid cached "no posts" answer and must not trigger a recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Entry present with at least one post
    Hit(Vec<Post>),
    /// Entry present and empty
    HitEmpty,
    /// No entry under the key
    Miss,
}

impl CacheLookup {
    fn from_posts(posts: Vec<Post>) -> Self {
        if posts.is_empty() {
            CacheLookup::HitEmpty
        } else {
            CacheLookup::Hit(posts)
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }

    /// Cached posts, `None` on a miss
    pub fn into_posts(self) -> Option<Vec<Post>> {
        match self {
            CacheLookup::Hit(posts) => Some(posts),
            CacheLookup::HitEmpty => Some(Vec::new()),
            CacheLookup::Miss => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::HitEmpty => "hit_empty",
            CacheLookup::Miss => "miss",
        }
    }
}

/// Typed feed access over a raw [`CacheStore`] with a fixed TTL per kind
#[derive(Clone)]
pub struct FeedCacheAccessor {
    store: Arc<dyn CacheStore>,
    kind: FeedKind,
    ttl: Duration,
}

impl FeedCacheAccessor {
    pub fn new(store: Arc<dyn CacheStore>, kind: FeedKind, ttl: Duration) -> Self {
        Self { store, kind, ttl }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> FeedResult<CacheLookup> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_cache_lookup(self.kind, "error");
                return Err(e);
            }
        };

        let lookup = match raw {
            Some(json) => match serde_json::from_str::<Vec<Post>>(&json) {
                Ok(posts) => CacheLookup::from_posts(posts),
                Err(e) => {
                    metrics::record_cache_lookup(self.kind, "error");
                    return Err(FeedError::CacheUnavailable(format!(
                        "Cache deserialization failed for {}: {}",
                        key, e
                    )));
                }
            },
            None => CacheLookup::Miss,
        };

        debug!(key = %key, result = lookup.label(), "Feed cache lookup");
        metrics::record_cache_lookup(self.kind, lookup.label());
        Ok(lookup)
    }

    pub async fn set(&self, key: &str, posts: &[Post]) -> FeedResult<()> {
        let json = serde_json::to_string(posts).map_err(|e| {
            FeedError::CacheUnavailable(format!("Cache serialization failed: {}", e))
        })?;

        self.store.set_ex(key, json, self.ttl).await?;

        debug!(
            key = %key,
            posts = posts.len(),
            ttl_secs = self.ttl.as_secs(),
            "Cached feed"
        );
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> FeedResult<()> {
        self.store.del(key).await
    }
}

/// Per-user home feed cache
#[derive(Clone)]
pub struct HomeFeedCache {
    accessor: FeedCacheAccessor,
}

impl HomeFeedCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            accessor: FeedCacheAccessor::new(store, FeedKind::Home, ttl),
        }
    }

    pub async fn get(&self, user_id: u32) -> FeedResult<CacheLookup> {
        self.accessor.get(&CacheKey::home(user_id)).await
    }

    pub async fn set(&self, user_id: u32, posts: &[Post]) -> FeedResult<()> {
        self.accessor.set(&CacheKey::home(user_id), posts).await
    }

    pub async fn delete(&self, user_id: u32) -> FeedResult<()> {
        self.accessor.delete(&CacheKey::home(user_id)).await
    }
}

/// Per-user explore feed cache
#[derive(Clone)]
pub struct ExploreFeedCache {
    accessor: FeedCacheAccessor,
}

impl ExploreFeedCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            accessor: FeedCacheAccessor::new(store, FeedKind::Explore, ttl),
        }
    }

    pub async fn get(&self, user_id: u32) -> FeedResult<CacheLookup> {
        self.accessor.get(&CacheKey::explore(user_id)).await
    }

    pub async fn set(&self, user_id: u32, posts: &[Post]) -> FeedResult<()> {
        self.accessor.set(&CacheKey::explore(user_id), posts).await
    }

    pub async fn delete(&self, user_id: u32) -> FeedResult<()> {
        self.accessor.delete(&CacheKey::explore(user_id)).await
    }
}

/// Global popular feed cache, written by the refresher and on read misses
#[derive(Clone)]
pub struct PopularFeedCache {
    accessor: FeedCacheAccessor,
}

impl PopularFeedCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            accessor: FeedCacheAccessor::new(store, FeedKind::Popular, ttl),
        }
    }

    pub async fn get(&self) -> FeedResult<CacheLookup> {
        self.accessor.get(&CacheKey::popular()).await
    }

    pub async fn set(&self, posts: &[Post]) -> FeedResult<()> {
        self.accessor.set(&CacheKey::popular(), posts).await
    }

    pub async fn delete(&self) -> FeedResult<()> {
        self.accessor.delete(&CacheKey::popular()).await
    }
}

/// Cache entry addressed by kind and, for per-user kinds, user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSlot {
    Home(u32),
    Explore(u32),
    Popular,
}

impl CacheSlot {
    pub fn kind(&self) -> FeedKind {
        match self {
            CacheSlot::Home(_) => FeedKind::Home,
            CacheSlot::Explore(_) => FeedKind::Explore,
            CacheSlot::Popular => FeedKind::Popular,
        }
    }

    pub fn key(&self) -> String {
        match self {
            CacheSlot::Home(user_id) => CacheKey::home(*user_id),
            CacheSlot::Explore(user_id) => CacheKey::explore(*user_id),
            CacheSlot::Popular => CacheKey::popular(),
        }
    }
}

/// The three feed caches over one shared store
#[derive(Clone)]
pub struct FeedCaches {
    pub home: HomeFeedCache,
    pub explore: ExploreFeedCache,
    pub popular: PopularFeedCache,
}

impl FeedCaches {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            home: HomeFeedCache::new(Arc::clone(&store), config.home_ttl),
            explore: ExploreFeedCache::new(Arc::clone(&store), config.explore_ttl),
            popular: PopularFeedCache::new(store, config.popular_ttl),
        }
    }

    pub async fn get(&self, slot: CacheSlot) -> FeedResult<CacheLookup> {
        match slot {
            CacheSlot::Home(user_id) => self.home.get(user_id).await,
            CacheSlot::Explore(user_id) => self.explore.get(user_id).await,
            CacheSlot::Popular => self.popular.get().await,
        }
    }

    pub async fn set(&self, slot: CacheSlot, posts: &[Post]) -> FeedResult<()> {
        match slot {
            CacheSlot::Home(user_id) => self.home.set(user_id, posts).await,
            CacheSlot::Explore(user_id) => self.explore.set(user_id, posts).await,
            CacheSlot::Popular => self.popular.set(posts).await,
        }
    }

    pub async fn delete(&self, slot: CacheSlot) -> FeedResult<()> {
        match slot {
            CacheSlot::Home(user_id) => self.home.delete(user_id).await,
            CacheSlot::Explore(user_id) => self.explore.delete(user_id).await,
            CacheSlot::Popular => self.popular.delete().await,
        }
    }
}
