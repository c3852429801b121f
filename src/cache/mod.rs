// Cache layer: rate limit buckets and card query results, each behind a
// store trait with in-memory and Redis backings.

pub mod invalidation;
pub mod keys;
pub mod models;
pub mod operations;

use thiserror::Error;

pub use invalidation::{CardCacheInvalidator, DEFAULT_MIN_CARD_PUBLIC_ID_LEN};
pub use models::{CardQueryKey, RateLimitBucket, RateLimitOutcome};
pub use operations::{
    MemoryQueryCache, MemoryRateLimitStore, QueryCache, RateLimitStore, RedisQueryCache,
    RedisRateLimitStore,
};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}
