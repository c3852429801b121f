use std::sync::Arc;

use cache::{CardCacheInvalidator, QueryCache, RateLimitStore};
use config::Config;

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub rate_limit_store: Arc<dyn RateLimitStore>,
    pub query_cache: Arc<dyn QueryCache>,
    pub invalidator: CardCacheInvalidator,
}

impl AppState {
    pub fn new(
        config: Config,
        rate_limit_store: Arc<dyn RateLimitStore>,
        query_cache: Arc<dyn QueryCache>,
    ) -> Self {
        let invalidator = CardCacheInvalidator::new(config.card_public_id_min_len);
        Self {
            config,
            rate_limit_store,
            query_cache,
            invalidator,
        }
    }
}
