//! Per-request cancellation context
//!
//! Every post store and cache call made on behalf of an inbound request runs
//! under a [`RequestContext`]. The context fires when its token is cancelled
//! (explicitly, or because the handler future was dropped on client
//! disconnect) or when its deadline passes. Detached work such as background
//! cache population never runs under a request context.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{FeedError, FeedResult};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without a deadline, cancelled only explicitly
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that fires after `timeout`; a timeout past the clock's range means no deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels the context when dropped
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }

    /// Resolves once the token is cancelled or the deadline passes
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Drive `fut` until it completes or the context fires.
    ///
    /// When the context fires first `fut` is dropped and `FeedError::Cancelled`
    /// is returned.
    pub async fn run<T, F>(&self, fut: F) -> FeedResult<T>
    where
        F: Future<Output = FeedResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(FeedError::Cancelled),
            result = fut => result,
        }
    }
}
