use actix_web::{dev::Service, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_service::cache::{CacheConfig, CacheStore, FeedCaches, RedisCacheStore};
use feed_service::config::Config;
use feed_service::db::{PgPostStore, PostSource};
use feed_service::handlers::{self, FeedHandlerState};
use feed_service::jobs::PopularFeedRefresher;
use feed_service::services::FeedAggregator;

/// Bound on each shutdown step (refresher stop, cache write drain)
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Starting feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let db_pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };
    info!("✅ Connected to database");

    let redis_store = match RedisCacheStore::connect(&config.redis.url).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Redis connection failed: {}", e);
            eprintln!("ERROR: Failed to connect to Redis: {}", e);
            std::process::exit(1);
        }
    };
    match redis_store.ping().await {
        Ok(status) => info!(status = %status, "✅ Redis connection established"),
        Err(e) => {
            tracing::error!("Redis connection was refused: {}", e);
            eprintln!("ERROR: Redis connection was refused: {}", e);
            std::process::exit(1);
        }
    }

    let store: Arc<dyn CacheStore> = Arc::new(redis_store);
    let caches = Arc::new(FeedCaches::new(store, &CacheConfig::default()));
    let source: Arc<dyn PostSource> = Arc::new(PgPostStore::new(db_pool));

    let aggregator = Arc::new(FeedAggregator::with_config(
        Arc::clone(&source),
        Arc::clone(&caches),
        config.feed.aggregator(),
    ));

    // Popular feed refresher - keeps the popular cache slot warm
    let refresher = PopularFeedRefresher::new(
        Arc::clone(&source),
        caches.popular.clone(),
        config.feed.refresher(),
    );
    let (refresher_shutdown, refresher_handle) = refresher.spawn();
    info!("✅ Popular feed refresher started");

    let feed_state = web::Data::new(FeedHandlerState::new(
        Arc::clone(&aggregator),
        config.feed.request_timeout(),
    ));

    let bind_address = config.bind_address();
    info!("HTTP server listening on {}", bind_address);

    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(feed_state.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route(
                "/metrics",
                web::get().to(feed_service::metrics::serve_metrics),
            )
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = req
                    .match_pattern()
                    .unwrap_or_else(|| req.path().to_string());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    let result = fut.await;
                    let status = match &result {
                        Ok(res) => res.status().as_u16(),
                        Err(_) => 500,
                    };
                    feed_service::metrics::observe_http_request(
                        &method,
                        &path,
                        status,
                        start.elapsed(),
                    );
                    result
                }
            })
            .configure(handlers::configure)
    })
    .bind(bind_address)?
    .run()
    .await;

    info!("HTTP server stopped, shutting down background work");

    let _ = refresher_shutdown.send(());
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, refresher_handle).await {
        Ok(Ok(())) => info!("Popular feed refresher shut down gracefully"),
        Ok(Err(e)) => tracing::warn!("Popular feed refresher task failed: {}", e),
        Err(_) => tracing::warn!("Popular feed refresher did not shut down within timeout"),
    }

    aggregator.shutdown(SHUTDOWN_TIMEOUT).await;

    server_result
}
