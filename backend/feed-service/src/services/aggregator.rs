//! Feed Aggregator
//!
//! Cache-aside reads for the home and popular feeds, uncached random feed, and
//! the explore feed composed from three concurrent legs:
//!
//! 1. home feed for the user, sampled down to 5 posts
//! 2. popular feed read through the popular cache, sampled down to 10 posts
//! 3. random feed of 20 posts
//!
//! Segments are concatenated home, popular, random with no deduplication.
//! Explore is all-or-nothing: any failed leg fails the request.
//!
//! Cache population after a miss runs detached from the request. Concurrent
//! misses on one key each recompute and write; the last writer wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{JoinError, JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::sampling;
use crate::cache::{CacheKey, CacheLookup, CacheSlot, FeedCaches};
use crate::context::RequestContext;
use crate::db::{PostSource, RANDOM_FEED_SIZE};
use crate::error::{ExploreLeg, FeedError, FeedResult, LegFailure};
use crate::metrics;
use crate::models::{FeedKind, Post};

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Size of the random feed and of the explore random segment
    pub random_feed_size: u32,
    /// Max posts taken from the home feed into explore
    pub explore_home_sample: usize,
    /// Max posts taken from the popular feed into explore
    pub explore_popular_sample: usize,
    /// Bound on each detached cache write
    pub cache_write_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            random_feed_size: RANDOM_FEED_SIZE,
            explore_home_sample: 5,
            explore_popular_sample: 10,
            cache_write_timeout: Duration::from_secs(5),
        }
    }
}

/// Explore segments, one slot per leg
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreSegments {
    pub home: Vec<Post>,
    pub popular: Vec<Post>,
    pub random: Vec<Post>,
}

impl ExploreSegments {
    pub fn len(&self) -> usize {
        self.home.len() + self.popular.len() + self.random.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate in fixed segment order: home, popular, random
    pub fn concat(self) -> Vec<Post> {
        let mut posts = Vec::with_capacity(self.len());
        posts.extend(self.home);
        posts.extend(self.popular);
        posts.extend(self.random);
        posts
    }
}

pub struct FeedAggregator {
    source: Arc<dyn PostSource>,
    caches: Arc<FeedCaches>,
    config: AggregatorConfig,
    cache_writes: TaskTracker,
    shutting_down: AtomicBool,
}

impl FeedAggregator {
    pub fn new(source: Arc<dyn PostSource>, caches: Arc<FeedCaches>) -> Self {
        Self::with_config(source, caches, AggregatorConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn PostSource>,
        caches: Arc<FeedCaches>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            source,
            caches,
            config,
            cache_writes: TaskTracker::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn caches(&self) -> &Arc<FeedCaches> {
        &self.caches
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Home feed for `user_id`, cache-aside
    pub async fn home(&self, ctx: &RequestContext, user_id: u32) -> FeedResult<Vec<Post>> {
        let result = self.home_inner(ctx, user_id).await;
        record_outcome(FeedKind::Home, &result);
        result
    }

    async fn home_inner(&self, ctx: &RequestContext, user_id: u32) -> FeedResult<Vec<Post>> {
        if let Some(posts) = ctx.run(self.caches.home.get(user_id)).await?.into_posts() {
            debug!(user_id, posts = posts.len(), "Home feed served from cache");
            return Ok(posts);
        }

        let posts = ctx.run(self.source.get_home_feed(user_id)).await?;
        self.populate_in_background(CacheSlot::Home(user_id), posts.clone());
        Ok(posts)
    }

    /// Global popular feed, cache-aside
    pub async fn popular(&self, ctx: &RequestContext) -> FeedResult<Vec<Post>> {
        let result = self.popular_inner(ctx).await;
        record_outcome(FeedKind::Popular, &result);
        result
    }

    async fn popular_inner(&self, ctx: &RequestContext) -> FeedResult<Vec<Post>> {
        if let Some(posts) = ctx.run(self.caches.popular.get()).await?.into_posts() {
            debug!(posts = posts.len(), "Popular feed served from cache");
            return Ok(posts);
        }

        let posts = ctx.run(self.source.get_popular_feed()).await?;
        self.populate_in_background(CacheSlot::Popular, posts.clone());
        Ok(posts)
    }

    /// Random feed, always computed fresh
    pub async fn random(&self, ctx: &RequestContext) -> FeedResult<Vec<Post>> {
        let result = ctx
            .run(self.source.get_random_feed(self.config.random_feed_size))
            .await;
        record_outcome(FeedKind::Random, &result);
        result
    }

    /// Explore feed for `user_id`, cache-aside over the three-leg composition
    pub async fn explore(&self, ctx: &RequestContext, user_id: u32) -> FeedResult<Vec<Post>> {
        let result = self.explore_inner(ctx, user_id).await;
        record_outcome(FeedKind::Explore, &result);
        result
    }

    async fn explore_inner(&self, ctx: &RequestContext, user_id: u32) -> FeedResult<Vec<Post>> {
        if let Some(posts) = ctx.run(self.caches.explore.get(user_id)).await?.into_posts() {
            debug!(user_id, posts = posts.len(), "Explore feed served from cache");
            return Ok(posts);
        }

        let start = Instant::now();
        let segments = self.compose_explore(ctx, user_id).await?;

        debug!(
            user_id,
            home = segments.home.len(),
            popular = segments.popular.len(),
            random = segments.random.len(),
            duration_ms = start.elapsed().as_millis(),
            "Explore feed composed"
        );

        let posts = segments.concat();
        self.populate_in_background(CacheSlot::Explore(user_id), posts.clone());
        Ok(posts)
    }

    /// Run the three explore legs concurrently and collect them.
    ///
    /// Waits for all legs or for `ctx` to fire. On cancellation the legs are
    /// abandoned: their tasks keep their own copy of `ctx` and stop at their
    /// next suspension point, and their results are discarded.
    pub async fn compose_explore(
        &self,
        ctx: &RequestContext,
        user_id: u32,
    ) -> FeedResult<ExploreSegments> {
        let home = self.spawn_home_leg(ctx, user_id);
        let popular = self.spawn_popular_leg(ctx);
        let random = self.spawn_random_leg(ctx);

        let (home, popular, random) = ctx
            .run(async { Ok(tokio::join!(home, popular, random)) })
            .await?;

        let mut failures = Vec::new();
        let segments = ExploreSegments {
            home: settle_leg(ExploreLeg::Home, home, &mut failures),
            popular: settle_leg(ExploreLeg::Popular, popular, &mut failures),
            random: settle_leg(ExploreLeg::Random, random, &mut failures),
        };

        if failures.is_empty() {
            return Ok(segments);
        }

        if failures.iter().any(|f| f.error.is_cancelled()) {
            return Err(FeedError::Cancelled);
        }

        for failure in &failures {
            metrics::record_explore_leg_failure(failure.leg);
        }
        Err(FeedError::CompositeFailure(failures))
    }

    fn spawn_home_leg(&self, ctx: &RequestContext, user_id: u32) -> JoinHandle<FeedResult<Vec<Post>>> {
        let source = Arc::clone(&self.source);
        let ctx = ctx.clone();
        let count = self.config.explore_home_sample;

        tokio::spawn(async move {
            let posts = ctx.run(source.get_home_feed(user_id)).await?;
            Ok(sampling::sample(posts, count))
        })
    }

    fn spawn_popular_leg(&self, ctx: &RequestContext) -> JoinHandle<FeedResult<Vec<Post>>> {
        let caches = Arc::clone(&self.caches);
        let ctx = ctx.clone();
        let count = self.config.explore_popular_sample;

        tokio::spawn(async move {
            match ctx.run(caches.popular.get()).await? {
                CacheLookup::Hit(posts) => Ok(sampling::sample(posts, count)),
                CacheLookup::HitEmpty => Ok(Vec::new()),
                CacheLookup::Miss => Err(FeedError::CacheMiss {
                    key: CacheKey::popular(),
                }),
            }
        })
    }

    fn spawn_random_leg(&self, ctx: &RequestContext) -> JoinHandle<FeedResult<Vec<Post>>> {
        let source = Arc::clone(&self.source);
        let ctx = ctx.clone();
        let limit = self.config.random_feed_size;

        tokio::spawn(async move { ctx.run(source.get_random_feed(limit)).await })
    }

    /// Write `posts` into `slot` on a detached task.
    ///
    /// The write ignores request cancellation, is bounded by the configured
    /// timeout and reports failures to logs and metrics only.
    fn populate_in_background(&self, slot: CacheSlot, posts: Vec<Post>) {
        let caches = Arc::clone(&self.caches);
        let timeout = self.config.cache_write_timeout;

        self.cache_writes.spawn(async move {
            let kind = slot.kind();
            match tokio::time::timeout(timeout, caches.set(slot, &posts)).await {
                Ok(Ok(())) => {
                    debug!(key = %slot.key(), posts = posts.len(), "Feed cache populated");
                }
                Ok(Err(e)) => {
                    metrics::record_cache_write_failure(kind, "error");
                    warn!(key = %slot.key(), error = %e, "Failed to populate feed cache");
                }
                Err(_) => {
                    metrics::record_cache_write_failure(kind, "timeout");
                    warn!(
                        key = %slot.key(),
                        timeout_ms = timeout.as_millis(),
                        "Feed cache population timed out"
                    );
                }
            }
        });
    }

    /// Number of detached cache writes still running
    pub fn pending_cache_writes(&self) -> usize {
        self.cache_writes.len()
    }

    /// Wait until every detached cache write spawned so far has finished.
    ///
    /// The tracker is left closed once [`shutdown`](Self::shutdown) has started,
    /// even when the two run concurrently.
    pub async fn flush_cache_writes(&self) {
        self.cache_writes.close();
        self.cache_writes.wait().await;

        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        self.cache_writes.reopen();
        // shutdown may have closed the tracker between the check and the reopen
        if self.shutting_down.load(Ordering::SeqCst) {
            self.cache_writes.close();
        }
    }

    /// Whether shutdown has closed the detached write tracker
    pub fn is_shut_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst) && self.cache_writes.is_closed()
    }

    /// Drain pending cache writes, giving up after `timeout`
    pub async fn shutdown(&self, timeout: Duration) {
        let pending = self.pending_cache_writes();
        self.shutting_down.store(true, Ordering::SeqCst);
        self.cache_writes.close();
        match tokio::time::timeout(timeout, self.cache_writes.wait()).await {
            Ok(()) => info!(pending, "Pending feed cache writes drained"),
            Err(_) => warn!(
                remaining = self.pending_cache_writes(),
                "Pending feed cache writes did not finish within timeout"
            ),
        }
    }
}

fn settle_leg(
    leg: ExploreLeg,
    joined: Result<FeedResult<Vec<Post>>, JoinError>,
    failures: &mut Vec<LegFailure>,
) -> Vec<Post> {
    let error = match joined {
        Ok(Ok(posts)) => return posts,
        Ok(Err(error)) => error,
        Err(join_err) => FeedError::Internal(format!("explore {} leg task failed: {}", leg, join_err)),
    };

    if !error.is_cancelled() {
        warn!(leg = %leg, error = %error, "Explore leg failed");
    }
    failures.push(LegFailure { leg, error });
    Vec::new()
}

fn record_outcome(kind: FeedKind, result: &FeedResult<Vec<Post>>) {
    match result {
        Ok(_) => metrics::record_feed_request(kind, "success"),
        Err(e) => {
            metrics::record_feed_request(kind, e.kind());
            if !e.is_cancelled() {
                warn!(kind = %kind, error = %e, "Feed request failed");
            }
        }
    }
}
