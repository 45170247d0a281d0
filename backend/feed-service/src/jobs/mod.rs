//! Background jobs for feed-service

pub mod popular_refresher;

pub use popular_refresher::{PopularFeedRefresher, PopularRefresherConfig};
