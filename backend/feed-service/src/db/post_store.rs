//! Post Store
//!
//! PostgreSQL queries behind the home, popular and random feeds

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;

use super::PostSource;
use crate::error::{FeedError, FeedResult};
use crate::models::Post;

/// Only posts newer than this window are eligible for any feed
pub const RECENCY_WINDOW_DAYS: i32 = 3;

/// Cap on the popular feed
pub const POPULAR_FEED_LIMIT: i64 = 20;

type PostRow = (i64, String, DateTime<Utc>, i64);

fn into_posts(rows: Vec<PostRow>) -> FeedResult<Vec<Post>> {
    rows.into_iter()
        .map(|(id, content, created_at, author_id)| {
            let id = u32::try_from(id).map_err(|_| {
                FeedError::SourceUnavailable(format!("post id out of range: {}", id))
            })?;
            let author_id = u32::try_from(author_id).map_err(|_| {
                FeedError::SourceUnavailable(format!("author id out of range: {}", author_id))
            })?;
            Ok(Post {
                id,
                content,
                created_at,
                author_id,
            })
        })
        .collect()
}

/// PostgreSQL implementation of [`PostSource`]
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostSource for PgPostStore {
    async fn get_home_feed(&self, user_id: u32) -> FeedResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id::BIGINT, p.content, p.created_at, p.author_id::BIGINT
            FROM posts_post p
            JOIN interactions_followlinks f
              ON f.following_id = p.author_id
            WHERE f.follower_id = $1
              AND p.created_at >= NOW() - make_interval(days => $2)
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(i64::from(user_id))
        .bind(RECENCY_WINDOW_DAYS)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(user_id, "Failed to get home feed: {}", e);
            FeedError::from(e)
        })?;

        into_posts(rows)
    }

    async fn get_popular_feed(&self) -> FeedResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id::BIGINT, p.content, p.created_at, p.author_id::BIGINT
            FROM posts_post AS p
            LEFT JOIN interactions_like AS l
              ON l.post_id = p.id
            WHERE p.created_at >= NOW() - make_interval(days => $1)
            GROUP BY p.id, p.content, p.created_at, p.author_id
            ORDER BY COUNT(l.id) DESC
            LIMIT $2
            "#,
        )
        .bind(RECENCY_WINDOW_DAYS)
        .bind(POPULAR_FEED_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get popular feed: {}", e);
            FeedError::from(e)
        })?;

        into_posts(rows)
    }

    async fn get_random_feed(&self, limit: u32) -> FeedResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, content, created_at, author_id
            FROM (
                SELECT p.id::BIGINT AS id, p.content, p.created_at, p.author_id::BIGINT AS author_id
                FROM posts_post AS p
                WHERE p.created_at >= NOW() - make_interval(days => $1)
                ORDER BY random()
                LIMIT $2
            ) AS sample
            ORDER BY created_at DESC
            "#,
        )
        .bind(RECENCY_WINDOW_DAYS)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(limit, "Failed to get random feed: {}", e);
            FeedError::from(e)
        })?;

        into_posts(rows)
    }
}
