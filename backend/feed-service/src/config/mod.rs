use anyhow::{ensure, Context, Result};
use std::time::Duration;

use crate::jobs::PopularRefresherConfig;
use crate::services::AggregatorConfig;

/// Upper bound on every configured interval or timeout (7 days)
const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub request_timeout_secs: u64,
    pub cache_write_timeout_secs: u64,
    pub popular_refresh_enabled: bool,
    pub popular_refresh_interval_secs: u64,
    pub popular_refresh_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            cache_write_timeout_secs: default_cache_write_timeout_secs(),
            popular_refresh_enabled: default_true(),
            popular_refresh_interval_secs: default_popular_refresh_interval_secs(),
            popular_refresh_timeout_secs: default_popular_refresh_timeout_secs(),
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            cache_write_timeout: Duration::from_secs(self.cache_write_timeout_secs),
            ..AggregatorConfig::default()
        }
    }

    pub fn refresher(&self) -> PopularRefresherConfig {
        PopularRefresherConfig {
            enabled: self.popular_refresh_enabled,
            interval: Duration::from_secs(self.popular_refresh_interval_secs),
            cycle_timeout: Duration::from_secs(self.popular_refresh_timeout_secs),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            app: AppConfig {
                env: var("APP_ENV", "development"),
                host: var("APP_HOST", "127.0.0.1"),
                port: parse_var(&lookup, "APP_PORT", 8080)?,
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            redis: RedisConfig {
                url: match lookup("REDIS_URL") {
                    Some(url) => url,
                    None => redis_url(
                        &var("REDIS_HOSTNAME", "127.0.0.1"),
                        parse_var(&lookup, "REDIS_PORT", 6379u16)?,
                        lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()).as_deref(),
                        parse_var(&lookup, "FEED_SERVICE_REDIS_DB", 0u32)?,
                    ),
                },
            },
            feed: FeedConfig {
                request_timeout_secs: parse_secs(
                    &lookup,
                    "FEED_REQUEST_TIMEOUT_SECS",
                    default_request_timeout_secs(),
                )?,
                cache_write_timeout_secs: parse_secs(
                    &lookup,
                    "FEED_CACHE_WRITE_TIMEOUT_SECS",
                    default_cache_write_timeout_secs(),
                )?,
                popular_refresh_enabled: parse_var(
                    &lookup,
                    "POPULAR_REFRESH_ENABLED",
                    default_true(),
                )?,
                popular_refresh_interval_secs: parse_secs(
                    &lookup,
                    "POPULAR_REFRESH_INTERVAL_SECS",
                    default_popular_refresh_interval_secs(),
                )?,
                popular_refresh_timeout_secs: parse_secs(
                    &lookup,
                    "POPULAR_REFRESH_TIMEOUT_SECS",
                    default_popular_refresh_timeout_secs(),
                )?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Parse a duration in whole seconds within `1..=MAX_DURATION_SECS`
fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_var(lookup, key, default)?;
    ensure!(
        (1..=MAX_DURATION_SECS).contains(&secs),
        "invalid value for {}: {} (expected 1..={} seconds)",
        key,
        secs,
        MAX_DURATION_SECS
    );
    Ok(secs)
}

fn redis_url(host: &str, port: u16, password: Option<&str>, db: u32) -> String {
    match password {
        Some(password) => format!("redis://:{}@{}:{}/{}", password, host, port, db),
        None => format!("redis://{}:{}/{}", host, port, db),
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_cache_write_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_popular_refresh_interval_secs() -> u64 {
    60 * 60
}

fn default_popular_refresh_timeout_secs() -> u64 {
    30
}
