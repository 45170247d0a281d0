//! Feed cache key schema
//!
//! Key format: feed:{kind}[:{user_id}]
//! The popular feed is global and carries no user dimension.

use crate::models::FeedKind;

pub struct CacheKey;

impl CacheKey {
    /// Format: feed:home:{user_id}
    pub fn home(user_id: u32) -> String {
        format!("feed:{}:{}", FeedKind::Home, user_id)
    }

    /// Format: feed:explore:{user_id}
    pub fn explore(user_id: u32) -> String {
        format!("feed:{}:{}", FeedKind::Explore, user_id)
    }

    /// Format: feed:popular
    pub fn popular() -> String {
        format!("feed:{}", FeedKind::Popular)
    }
}
