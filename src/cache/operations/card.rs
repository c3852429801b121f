use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::CacheError;
use crate::cache::keys::QUERY_INVALIDATE_CHANNEL;
use crate::cache::models::card::{CachedQuery, CardQueryKey};

/// The data layer's invalidation capability: marks every cached result
/// matching the key stale or removes it.
#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn invalidate(&self, key: &CardQueryKey) -> Result<(), CacheError>;
}

/// In-process query cache. Invalidation keeps the last result but marks it
/// stale so readers know to refetch.
#[derive(Debug, Default)]
pub struct MemoryQueryCache {
    entries: DashMap<String, CachedQuery>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &CardQueryKey, data: serde_json::Value) {
        self.entries.insert(
            key.cache_key(),
            CachedQuery {
                data,
                stale: false,
                updated_at: chrono::Utc::now().timestamp_millis(),
            },
        );
    }

    pub fn get(&self, key: &CardQueryKey) -> Option<CachedQuery> {
        self.entries.get(&key.cache_key()).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    async fn invalidate(&self, key: &CardQueryKey) -> Result<(), CacheError> {
        if let Some(mut entry) = self.entries.get_mut(&key.cache_key()) {
            entry.stale = true;
        }
        Ok(())
    }
}

/// Redis-backed query cache: deletes the cached result and announces the key
/// on [`QUERY_INVALIDATE_CHANNEL`].
pub struct RedisQueryCache {
    redis: Arc<RedisClient>,
}

impl RedisQueryCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    /// Caches a query result for `ttl` seconds.
    pub async fn set(
        &self,
        key: &CardQueryKey,
        data: &serde_json::Value,
        ttl: u64,
    ) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(data)?;
        let _: () = conn.set_ex(key.cache_key(), json, ttl).await?;
        Ok(())
    }

    pub async fn get(&self, key: &CardQueryKey) -> Result<Option<serde_json::Value>, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.get(key.cache_key()).await?;

        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueryCache for RedisQueryCache {
    async fn invalidate(&self, key: &CardQueryKey) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let descriptor = serde_json::to_string(key)?;

        let _: () = conn.del(key.cache_key()).await?;
        let _: () = conn.publish(QUERY_INVALIDATE_CHANNEL, descriptor).await?;

        tracing::debug!("Invalidated {}", key.cache_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invalidate_marks_entry_stale() {
        let cache = MemoryQueryCache::new();
        let key = CardQueryKey::by_id("abcdef123456");
        cache.set(&key, json!({ "title": "Ship it" }));
        assert!(!cache.get(&key).unwrap().stale);

        cache.invalidate(&key).await.unwrap();

        let entry = cache.get(&key).unwrap();
        assert!(entry.stale);
        assert_eq!(entry.data["title"], "Ship it");
    }

    #[tokio::test]
    async fn invalidate_leaves_other_cards_alone() {
        let cache = MemoryQueryCache::new();
        let target = CardQueryKey::by_id("abcdef123456");
        let other = CardQueryKey::by_id("zyxwvu654321");
        cache.set(&target, json!(1));
        cache.set(&other, json!(2));

        cache.invalidate(&target).await.unwrap();

        assert!(!cache.get(&other).unwrap().stale);
    }

    #[tokio::test]
    async fn invalidating_an_uncached_key_is_ok() {
        let cache = MemoryQueryCache::new();
        cache
            .invalidate(&CardQueryKey::by_id("abcdef123456"))
            .await
            .unwrap();
        assert!(cache.get(&CardQueryKey::by_id("abcdef123456")).is_none());
    }

    #[tokio::test]
    #[ignore = "requires REDIS_URL"]
    async fn redis_invalidate_deletes_cached_result() {
        let url = std::env::var("REDIS_URL").unwrap();
        let cache = RedisQueryCache::new(Arc::new(RedisClient::open(url).unwrap()));
        let key = CardQueryKey::by_id("redistest0001");

        cache.set(&key, &json!({ "title": "cached" }), 60).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        cache.invalidate(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }
}
