pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use cache::{CacheConfig, CacheLookup, CacheStore, FeedCaches, RedisCacheStore};
pub use config::Config;
pub use context::RequestContext;
pub use db::{PgPostStore, PostSource};
pub use error::{ExploreLeg, FeedError, FeedResult, LegFailure};
pub use jobs::{PopularFeedRefresher, PopularRefresherConfig};
pub use models::{FeedKind, Post};
pub use services::{AggregatorConfig, FeedAggregator};
