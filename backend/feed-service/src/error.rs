use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type FeedResult<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Post source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache entry missing: {key}")]
    CacheMiss { key: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Explore feed failed: {}", join_failures(.0))]
    CompositeFailure(Vec<LegFailure>),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// The three independent legs of the explore feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreLeg {
    Home,
    Popular,
    Random,
}

impl ExploreLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Popular => "popular",
            Self::Random => "random",
        }
    }
}

impl std::fmt::Display for ExploreLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed explore leg together with its cause
#[derive(Debug, Error)]
#[error("{leg} leg: {error}")]
pub struct LegFailure {
    pub leg: ExploreLeg,
    #[source]
    pub error: FeedError,
}

fn join_failures(failures: &[LegFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl FeedError {
    /// Failures of a composite error, empty for every other variant
    pub fn failures(&self) -> &[LegFailure] {
        match self {
            FeedError::CompositeFailure(failures) => failures,
            _ => &[],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled)
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::SourceUnavailable(_) => "source_unavailable",
            FeedError::CacheUnavailable(_) => "cache_unavailable",
            FeedError::CacheMiss { .. } => "cache_miss",
            FeedError::Cancelled => "cancelled",
            FeedError::CompositeFailure(_) => "composite_failure",
            FeedError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for FeedError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let message = match self {
            FeedError::Cancelled => "the request timed out",
            _ => "the server has a problem",
        };

        HttpResponse::build(code).json(ErrorResponse {
            error: message.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            FeedError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for FeedError {
    fn from(err: sqlx::Error) -> Self {
        FeedError::SourceUnavailable(err.to_string())
    }
}

impl From<redis::RedisError> for FeedError {
    fn from(err: redis::RedisError) -> Self {
        FeedError::CacheUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::CacheUnavailable(format!("malformed cache entry: {}", err))
    }
}
