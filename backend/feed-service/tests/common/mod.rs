//! Shared fixtures for feed-service integration tests
//!
//! - `InMemoryCacheStore`: HashMap-backed `CacheStore` with failure switches
//! - `ScriptedPostSource`: `PostSource` whose answers and latencies are set per test

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feed_service::cache::{CacheConfig, CacheStore, FeedCaches};
use feed_service::db::PostSource;
use feed_service::{FeedError, FeedResult, Post};

/// Build a post with a deterministic timestamp derived from its id
pub fn post(id: u32) -> Post {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    Post {
        id,
        content: format!("post #{}", id),
        created_at: base + ChronoDuration::minutes(i64::from(id)),
        author_id: id % 7 + 1,
    }
}

pub fn posts<I: IntoIterator<Item = u32>>(ids: I) -> Vec<Post> {
    ids.into_iter().map(post).collect()
}

pub fn ids(posts: &[Post]) -> Vec<u32> {
    posts.iter().map(|p| p.id).collect()
}

#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Duration)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryCacheStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Duration::ZERO));
    }

    pub fn insert_posts(&self, key: &str, posts: &[Post]) {
        self.insert_raw(key, &serde_json::to_string(posts).unwrap());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone())
    }

    pub fn posts(&self, key: &str) -> Option<Vec<Post>> {
        self.raw(key).map(|raw| serde_json::from_str(&raw).unwrap())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> FeedResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FeedError::CacheUnavailable("connection refused".into()));
        }
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> FeedResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::CacheUnavailable("connection refused".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> FeedResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::CacheUnavailable("connection refused".into()));
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

pub fn feed_caches(store: &Arc<InMemoryCacheStore>) -> Arc<FeedCaches> {
    let store: Arc<dyn CacheStore> = store.clone();
    Arc::new(FeedCaches::new(store, &CacheConfig::default()))
}

type Responder<A> = Box<dyn Fn(A, usize) -> FeedResult<Vec<Post>> + Send + Sync>;

/// `PostSource` with per-operation answers and latencies.
///
/// Responders receive the call argument and the 1-based call number.
pub struct ScriptedPostSource {
    home: Responder<u32>,
    popular: Responder<()>,
    random: Responder<u32>,
    home_delay: Duration,
    popular_delay: Duration,
    random_delay: Duration,
    home_calls: AtomicUsize,
    popular_calls: AtomicUsize,
    random_calls: AtomicUsize,
    completed: AtomicUsize,
}

impl Default for ScriptedPostSource {
    fn default() -> Self {
        Self {
            home: Box::new(|_, _| Ok(Vec::new())),
            popular: Box::new(|_, _| Ok(Vec::new())),
            random: Box::new(|_, _| Ok(Vec::new())),
            home_delay: Duration::ZERO,
            popular_delay: Duration::ZERO,
            random_delay: Duration::ZERO,
            home_calls: AtomicUsize::new(0),
            popular_calls: AtomicUsize::new(0),
            random_calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }
}

impl ScriptedPostSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn home<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, usize) -> FeedResult<Vec<Post>> + Send + Sync + 'static,
    {
        self.home = Box::new(f);
        self
    }

    pub fn popular<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> FeedResult<Vec<Post>> + Send + Sync + 'static,
    {
        self.popular = Box::new(move |_, call| f(call));
        self
    }

    pub fn random<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, usize) -> FeedResult<Vec<Post>> + Send + Sync + 'static,
    {
        self.random = Box::new(f);
        self
    }

    pub fn home_delay(mut self, delay: Duration) -> Self {
        self.home_delay = delay;
        self
    }

    pub fn popular_delay(mut self, delay: Duration) -> Self {
        self.popular_delay = delay;
        self
    }

    pub fn random_delay(mut self, delay: Duration) -> Self {
        self.random_delay = delay;
        self
    }

    pub fn home_calls(&self) -> usize {
        self.home_calls.load(Ordering::SeqCst)
    }

    pub fn popular_calls(&self) -> usize {
        self.popular_calls.load(Ordering::SeqCst)
    }

    pub fn random_calls(&self) -> usize {
        self.random_calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion (not dropped mid-flight)
    pub fn completed_calls(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn finish(&self, result: FeedResult<Vec<Post>>) -> FeedResult<Vec<Post>> {
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl PostSource for ScriptedPostSource {
    async fn get_home_feed(&self, user_id: u32) -> FeedResult<Vec<Post>> {
        let call = self.home_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Self::pause(self.home_delay).await;
        self.finish((self.home)(user_id, call))
    }

    async fn get_popular_feed(&self) -> FeedResult<Vec<Post>> {
        let call = self.popular_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Self::pause(self.popular_delay).await;
        self.finish((self.popular)((), call))
    }

    async fn get_random_feed(&self, limit: u32) -> FeedResult<Vec<Post>> {
        let call = self.random_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Self::pause(self.random_delay).await;
        self.finish((self.random)(limit, call))
    }
}

pub fn source_down() -> FeedError {
    FeedError::SourceUnavailable("database is down".into())
}
