//! Popular Feed Refresher Background Job
//!
//! Recomputes the popular feed from the post store and overwrites the popular
//! cache entry on a fixed interval, independent of read traffic. The first
//! refresh runs immediately at startup so the cache is warm before the first
//! interval elapses.
//!
//! A failed cycle is logged and leaves the previous cache value in place until
//! its TTL or the next successful cycle. Each cycle is bounded by its own
//! timeout, so a hung store call costs at most one tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cache::PopularFeedCache;
use crate::db::PostSource;
use crate::error::FeedResult;
use crate::metrics;

/// How often to refresh the popular feed (every hour)
const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on a single refresh cycle
const CYCLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the popular feed refresher
#[derive(Debug, Clone)]
pub struct PopularRefresherConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub cycle_timeout: Duration,
}

impl Default for PopularRefresherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: REFRESH_INTERVAL,
            cycle_timeout: CYCLE_TIMEOUT,
        }
    }
}

pub struct PopularFeedRefresher {
    source: Arc<dyn PostSource>,
    cache: PopularFeedCache,
    config: PopularRefresherConfig,
}

impl PopularFeedRefresher {
    pub fn new(
        source: Arc<dyn PostSource>,
        cache: PopularFeedCache,
        config: PopularRefresherConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    /// Spawn the refresher loop.
    ///
    /// Returns the shutdown sender and the task handle. Sending on (or
    /// dropping) the sender stops the loop; a cycle in flight is abandoned.
    pub fn spawn(self) -> (watch::Sender<()>, JoinHandle<()>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(self.run(shutdown_rx));
        (shutdown_tx, handle)
    }

    /// Refresher loop; returns once `shutdown` fires
    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        if !self.config.enabled {
            info!("Popular feed refresher disabled by configuration");
            return;
        }

        if self.config.interval.is_zero() {
            error!("Popular feed refresher interval must be non-zero, not starting");
            return;
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            cycle_timeout_secs = self.config.cycle_timeout.as_secs(),
            "Starting popular feed refresher"
        );

        // First tick completes immediately, which is the startup refresh
        let mut timer = interval(self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Popular feed refresher received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => {
                            info!("Popular feed refresher abandoning cycle on shutdown");
                            break;
                        }
                        _ = self.run_cycle() => {}
                    }
                }
            }
        }

        info!("Popular feed refresher stopped");
    }

    /// Run one bounded refresh cycle and record its outcome
    async fn run_cycle(&self) {
        let cycle_start = Instant::now();

        let status = match tokio::time::timeout(self.config.cycle_timeout, self.refresh_once()).await
        {
            Ok(Ok(count)) => {
                info!(
                    posts = count,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Popular feed refreshed"
                );
                "success"
            }
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Popular feed refresh failed"
                );
                "error"
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.cycle_timeout.as_millis(),
                    "Popular feed refresh timed out"
                );
                "timeout"
            }
        };

        metrics::record_refresh_run(status);
        metrics::record_refresh_duration(cycle_start.elapsed());
    }

    /// Recompute the popular feed and overwrite its cache entry.
    ///
    /// Returns the number of posts written.
    pub async fn refresh_once(&self) -> FeedResult<usize> {
        let posts = self.source.get_popular_feed().await?;
        debug!(posts = posts.len(), "Computed popular feed");

        self.cache.set(&posts).await?;
        Ok(posts.len())
    }
}
