pub mod post_store;

pub use post_store::PgPostStore;

use async_trait::async_trait;

use crate::error::FeedResult;
use crate::models::Post;

/// Default number of posts returned by the random feed
pub const RANDOM_FEED_SIZE: u32 = 20;

/// Source of post sequences for the feeds.
///
/// Every call is a suspension point; callers cancel a call by dropping its
/// future. Implementations must be safe for concurrent use.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Posts by authors the user follows, recency-windowed, newest first
    async fn get_home_feed(&self, user_id: u32) -> FeedResult<Vec<Post>>;

    /// Recency-windowed posts ranked by engagement, capped
    async fn get_popular_feed(&self) -> FeedResult<Vec<Post>>;

    /// Random sample of recency-windowed posts, newest first, at most `limit`
    async fn get_random_feed(&self, limit: u32) -> FeedResult<Vec<Post>>;
}
