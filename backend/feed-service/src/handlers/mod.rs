pub mod feed;

pub use feed::{
    configure, get_explore_feed, get_home_feed, get_popular_feed, get_random_feed,
    FeedHandlerState,
};
