use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as read from the post store.
///
/// Posts are immutable snapshots; feeds are ordered sequences of them and the
/// cache keeps that order through serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_id: u32,
}

/// Feed kinds served by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Home,
    Explore,
    Popular,
    Random,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Explore => "explore",
            Self::Popular => "popular",
            Self::Random => "random",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feed response body: the requesting user (0 for global feeds) and post ids in feed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedIdsResponse {
    pub user: u32,
    pub ids: Vec<u32>,
}

impl FeedIdsResponse {
    pub fn new(user: u32, posts: &[Post]) -> Self {
        Self {
            user,
            ids: posts.iter().map(|p| p.id).collect(),
        }
    }

    pub fn global(posts: &[Post]) -> Self {
        Self::new(0, posts)
    }
}
