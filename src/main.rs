use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use kan_api::{
    AppState,
    cache::{
        MemoryQueryCache, MemoryRateLimitStore, QueryCache, RateLimitStore, RedisQueryCache,
        RedisRateLimitStore,
    },
    config::Config,
    router::create_router,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // Redis when configured, otherwise per-process stores.
    let (rate_limit_store, query_cache): (Arc<dyn RateLimitStore>, Arc<dyn QueryCache>) =
        match &config.redis_url {
            Some(url) => {
                let redis = Arc::new(
                    redis::Client::open(url.as_str()).expect("Failed to create Redis client"),
                );
                tracing::info!("Using Redis for rate limits and query cache");
                let store: Arc<dyn RateLimitStore> =
                    Arc::new(RedisRateLimitStore::new(redis.clone()));
                let cache: Arc<dyn QueryCache> = Arc::new(RedisQueryCache::new(redis));
                (store, cache)
            }
            None => {
                let store = Arc::new(MemoryRateLimitStore::new());
                store.clone().spawn_sweeper(config.rate_limit_sweep_interval());
                tracing::info!("REDIS_URL not set, using in-memory rate limits and query cache");
                let cache: Arc<dyn QueryCache> = Arc::new(MemoryQueryCache::new());
                (store as Arc<dyn RateLimitStore>, cache)
            }
        };

    tracing::info!(
        "Rate limit: {} requests per {}s per client, failure policy {:?}",
        config.rate_limit_requests,
        config.rate_limit_window().as_secs(),
        config.rate_limit_failure_policy
    );

    let state = AppState::new(config.clone(), rate_limit_store, query_cache);
    let router = create_router(state).expect("Invalid rate limit configuration");

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
