//! Popular feed refresher loop under paused tokio time

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{feed_caches, ids, posts, source_down, InMemoryCacheStore, ScriptedPostSource};
use feed_service::{FeedError, PopularFeedRefresher, PopularRefresherConfig};

const INTERVAL: Duration = Duration::from_secs(60);

fn config() -> PopularRefresherConfig {
    PopularRefresherConfig {
        enabled: true,
        interval: INTERVAL,
        cycle_timeout: Duration::from_secs(30),
    }
}

fn refresher(
    source: &Arc<ScriptedPostSource>,
    store: &Arc<InMemoryCacheStore>,
    config: PopularRefresherConfig,
) -> PopularFeedRefresher {
    PopularFeedRefresher::new(source.clone(), feed_caches(store).popular.clone(), config)
}

/// Let spawned tasks run without crossing the next tick
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn cached_ids(store: &InMemoryCacheStore) -> Option<Vec<u32>> {
    store.posts("feed:popular").map(|p| ids(&p))
}

#[tokio::test(start_paused = true)]
async fn test_refreshes_immediately_on_start() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Ok(posts([3, 2, 1]))));

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;

    assert_eq!(source.popular_calls(), 1);
    assert_eq!(cached_ids(&store), Some(vec![3, 2, 1]));
    assert_eq!(store.ttl("feed:popular"), Some(Duration::from_secs(86_400)));

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cache_holds_latest_cycle_result() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|call| Ok(posts([call as u32]))));

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;

    // Readers between cycles always find an entry once the first refresh ran
    for _ in 0..6 {
        assert!(store.contains("feed:popular"));
        tokio::time::sleep(INTERVAL / 2).await;
    }

    // Startup refresh plus one per elapsed interval
    assert_eq!(source.popular_calls(), 4);
    assert_eq!(cached_ids(&store), Some(vec![4]));

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_keeps_previous_value() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|call| {
        if call == 1 {
            Ok(posts([10, 9]))
        } else {
            Err(source_down())
        }
    }));

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;
    tokio::time::sleep(INTERVAL * 2).await;

    assert_eq!(source.popular_calls(), 3);
    assert_eq!(cached_ids(&store), Some(vec![10, 9]));
    assert_eq!(store.writes(), 1);

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cache_write_failure_does_not_stop_loop() {
    let store = InMemoryCacheStore::new();
    store.fail_writes(true);
    let source = Arc::new(ScriptedPostSource::new().popular(|call| Ok(posts([call as u32]))));

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;
    assert!(!store.contains("feed:popular"));

    store.fail_writes(false);
    tokio::time::sleep(INTERVAL).await;

    assert_eq!(source.popular_calls(), 2);
    assert_eq!(cached_ids(&store), Some(vec![2]));

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hung_cycle_times_out_and_next_cycle_runs() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(
        ScriptedPostSource::new()
            .popular(|_| Ok(posts([1])))
            .popular_delay(Duration::from_secs(45)),
    );

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;
    tokio::time::sleep(INTERVAL).await;

    // Both cycles were cut off at the 30s bound
    assert_eq!(source.popular_calls(), 2);
    assert_eq!(source.completed_calls(), 0);
    assert!(!store.contains("feed:popular"));

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_loop() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Ok(posts([1]))));

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;

    shutdown.send(()).unwrap();
    handle.await.unwrap();

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(source.popular_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_sender_stops_the_loop() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Ok(posts([1]))));

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;
    drop(shutdown);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("refresher should stop once its sender is gone")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_cycle_in_flight() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(
        ScriptedPostSource::new()
            .popular(|_| Ok(posts([1])))
            .popular_delay(Duration::from_secs(20)),
    );

    let (shutdown, handle) = refresher(&source, &store, config()).spawn();
    settle().await;
    assert_eq!(source.popular_calls(), 1);

    shutdown.send(()).unwrap();
    handle.await.unwrap();

    assert_eq!(source.completed_calls(), 0);
    assert!(!store.contains("feed:popular"));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_refresher_does_nothing() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Ok(posts([1]))));

    let config = PopularRefresherConfig {
        enabled: false,
        ..config()
    };
    let (_shutdown, handle) = refresher(&source, &store, config).spawn();
    handle.await.unwrap();

    assert_eq!(source.popular_calls(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_refresh_once_reports_failure_and_leaves_cache() {
    let store = InMemoryCacheStore::new();
    store.insert_posts("feed:popular", &posts([5]));
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Err(source_down())));

    let err = refresher(&source, &store, config())
        .refresh_once()
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::SourceUnavailable(_)));
    assert_eq!(cached_ids(&store), Some(vec![5]));
}

#[tokio::test]
async fn test_refresh_once_overwrites_with_empty_feed() {
    let store = InMemoryCacheStore::new();
    store.insert_posts("feed:popular", &posts([5]));
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Ok(Vec::new())));

    let written = refresher(&source, &store, config())
        .refresh_once()
        .await
        .unwrap();

    assert_eq!(written, 0);
    assert_eq!(store.raw("feed:popular").as_deref(), Some("[]"));
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_exits_without_panicking() {
    let store = InMemoryCacheStore::new();
    let source = Arc::new(ScriptedPostSource::new().popular(|_| Ok(posts([1]))));

    let config = PopularRefresherConfig {
        interval: Duration::ZERO,
        ..config()
    };
    let (_shutdown, handle) = refresher(&source, &store, config).spawn();
    handle.await.unwrap();

    assert_eq!(source.popular_calls(), 0);
}
