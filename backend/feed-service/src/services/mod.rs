//! Service layer for feed-service
//!
//! - aggregator: cache-aside feed reads and explore feed composition
//! - sampling: down-sampling of explore segments

pub mod aggregator;
pub mod sampling;

pub use aggregator::{AggregatorConfig, ExploreSegments, FeedAggregator};
