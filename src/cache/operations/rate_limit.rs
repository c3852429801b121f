use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{Client as RedisClient, Script};
use tokio::task::JoinHandle;

use crate::cache::CacheError;
use crate::cache::models::rate_limit::{RateLimitBucket, RateLimitOutcome};
use crate::config::RateLimitConfig;

/// Backing store for fixed-window rate limit buckets.
///
/// `increment` is the admission decision: resetting an elapsed window,
/// comparing against the quota and counting the request happen as one atomic
/// step per key. A rejected request is not counted.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Current bucket for `key`, or `None` if it is absent or its window has
    /// elapsed.
    async fn get(&self, key: &str, now: i64) -> Result<Option<RateLimitBucket>, CacheError>;

    async fn increment(
        &self,
        key: &str,
        limit: &RateLimitConfig,
        now: i64,
    ) -> Result<RateLimitOutcome, CacheError>;

    async fn reset(&self, key: &str) -> Result<(), CacheError>;
}

fn outcome(admitted: bool, limit: &RateLimitConfig, count: u32, reset_at: i64) -> RateLimitOutcome {
    RateLimitOutcome {
        admitted,
        limit: limit.points(),
        remaining: limit.points().saturating_sub(count),
        reset_at,
    }
}

/// Single-process store. DashMap's entry guard locks the key's shard for the
/// whole check-and-increment.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    buckets: DashMap<String, RateLimitBucket>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drops every bucket whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_expired(now));
        before.saturating_sub(self.buckets.len())
    }

    /// Periodically evicts idle buckets so the map does not grow with every
    /// identity ever seen.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired(chrono::Utc::now().timestamp_millis());
                if removed > 0 {
                    tracing::debug!("Evicted {} expired rate limit buckets", removed);
                }
            }
        })
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn get(&self, key: &str, now: i64) -> Result<Option<RateLimitBucket>, CacheError> {
        Ok(self
            .buckets
            .get(key)
            .map(|bucket| *bucket)
            .filter(|bucket| !bucket.is_expired(now)))
    }

    async fn increment(
        &self,
        key: &str,
        limit: &RateLimitConfig,
        now: i64,
    ) -> Result<RateLimitOutcome, CacheError> {
        let duration_ms = limit.duration_ms();
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(now, duration_ms));

        if bucket.is_expired(now) {
            bucket.reset(now, duration_ms);
        }

        let admitted = bucket.count < limit.points();
        if admitted {
            bucket.count += 1;
        }

        Ok(outcome(admitted, limit, bucket.count, bucket.reset_at()))
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        self.buckets.remove(key);
        Ok(())
    }
}

// KEYS[1] bucket hash, ARGV[1] window in ms, ARGV[2] points.
// Returns {admitted, count, ttl_ms}. The hash expires with its window.
const INCREMENT_SCRIPT: &str = r"
local duration = tonumber(ARGV[1])
local points = tonumber(ARGV[2])
local count = tonumber(redis.call('HGET', KEYS[1], 'count') or '0')
local admitted = 0
if count < points then
  count = redis.call('HINCRBY', KEYS[1], 'count', 1)
  admitted = 1
end
if admitted == 1 and count == 1 then
  redis.call('HSET', KEYS[1], 'duration', duration)
  redis.call('PEXPIRE', KEYS[1], duration)
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], duration)
  ttl = duration
end
return {admitted, count, ttl}
";

/// Store shared by every process pointed at the same Redis.
pub struct RedisRateLimitStore {
    redis: Arc<RedisClient>,
    increment_script: Script,
}

impl RedisRateLimitStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            increment_script: Script::new(INCREMENT_SCRIPT),
        }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn get(&self, key: &str, now: i64) -> Result<Option<RateLimitBucket>, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let (count, duration, ttl): (Option<u32>, Option<i64>, i64) = redis::pipe()
            .hget(key, "count")
            .hget(key, "duration")
            .pttl(key)
            .query_async(&mut conn)
            .await?;

        let Some(count) = count else {
            return Ok(None);
        };
        if ttl <= 0 {
            return Ok(None);
        }
        let duration_ms = duration.unwrap_or(ttl);

        Ok(Some(RateLimitBucket {
            count,
            window_start: now.saturating_add(ttl).saturating_sub(duration_ms),
            duration_ms,
        }))
    }

    async fn increment(
        &self,
        key: &str,
        limit: &RateLimitConfig,
        now: i64,
    ) -> Result<RateLimitOutcome, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let (admitted, count, ttl): (i64, i64, i64) = self
            .increment_script
            .key(key)
            .arg(limit.duration_ms())
            .arg(limit.points())
            .invoke_async(&mut conn)
            .await?;

        Ok(outcome(
            admitted == 1,
            limit,
            count.clamp(0, u32::MAX as i64) as u32,
            now.saturating_add(ttl),
        ))
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(points: u32, secs: u64) -> RateLimitConfig {
        RateLimitConfig::new(points, secs).unwrap()
    }

    #[tokio::test]
    async fn admits_up_to_points_then_rejects() {
        let store = MemoryRateLimitStore::new();
        let limit = limit(3, 60);

        for expected_remaining in [2, 1, 0] {
            let outcome = store.increment("k", &limit, 1_000).await.unwrap();
            assert!(outcome.admitted);
            assert_eq!(outcome.remaining, expected_remaining);
        }

        let rejected = store.increment("k", &limit, 1_000).await.unwrap();
        assert!(!rejected.admitted);
        assert_eq!(rejected.reset_at, 61_000);

        // rejected requests are not counted
        let bucket = store.get("k", 1_000).await.unwrap().unwrap();
        assert_eq!(bucket.count, 3);
    }

    #[tokio::test]
    async fn elapsed_window_resets_lazily() {
        let store = MemoryRateLimitStore::new();
        let limit = limit(1, 60);

        assert!(store.increment("k", &limit, 0).await.unwrap().admitted);
        assert!(!store.increment("k", &limit, 59_999).await.unwrap().admitted);

        let next = store.increment("k", &limit, 60_001).await.unwrap();
        assert!(next.admitted);
        assert_eq!(next.reset_at, 120_001);
        assert_eq!(store.get("k", 60_001).await.unwrap().unwrap().window_start, 60_001);
    }

    #[tokio::test]
    async fn get_hides_expired_and_reset_removes() {
        let store = MemoryRateLimitStore::new();
        let limit = limit(5, 1);

        store.increment("k", &limit, 0).await.unwrap();
        assert!(store.get("k", 500).await.unwrap().is_some());
        assert!(store.get("k", 1_000).await.unwrap().is_none());

        store.reset("k").await.unwrap();
        assert!(store.is_empty());
        assert!(store.get("missing", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryRateLimitStore::new();
        let limit = limit(1, 60);

        assert!(store.increment("a", &limit, 0).await.unwrap().admitted);
        assert!(store.increment("b", &limit, 0).await.unwrap().admitted);
        assert!(!store.increment("a", &limit, 0).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_buckets() {
        let store = MemoryRateLimitStore::new();

        store.increment("short", &limit(5, 1), 0).await.unwrap();
        store.increment("long", &limit(5, 60), 0).await.unwrap();

        assert_eq!(store.purge_expired(1_000), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long", 1_000).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_never_exceed_points() {
        let store = Arc::new(MemoryRateLimitStore::new());
        let limit = limit(50, 60);

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment("k", &limit, 0).await.unwrap().admitted })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 50);
    }

    #[tokio::test]
    #[ignore = "requires REDIS_URL"]
    async fn redis_store_enforces_points() {
        let url = std::env::var("REDIS_URL").unwrap();
        let store = RedisRateLimitStore::new(Arc::new(RedisClient::open(url).unwrap()));
        let limit = limit(2, 60);
        let key = "rate_limit:test:redis_store_enforces_points";
        let now = chrono::Utc::now().timestamp_millis();

        store.reset(key).await.unwrap();
        assert!(store.increment(key, &limit, now).await.unwrap().admitted);
        assert!(store.increment(key, &limit, now).await.unwrap().admitted);
        assert!(!store.increment(key, &limit, now).await.unwrap().admitted);
        assert_eq!(store.get(key, now).await.unwrap().unwrap().count, 2);
        store.reset(key).await.unwrap();
    }

    fn redis_store() -> Arc<RedisRateLimitStore> {
        let url = std::env::var("REDIS_URL").unwrap();
        Arc::new(RedisRateLimitStore::new(Arc::new(RedisClient::open(url).unwrap())))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires REDIS_URL"]
    async fn redis_concurrent_increments_never_exceed_points() {
        let store = redis_store();
        let limit = limit(50, 60);
        let key = "rate_limit:test:redis_concurrent_increments";
        let now = chrono::Utc::now().timestamp_millis();
        store.reset(key).await.unwrap();

        let handles: Vec<_> = (0..80)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment(key, &limit, now).await.unwrap().admitted })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 50);
        assert_eq!(store.get(key, now).await.unwrap().unwrap().count, 50);
        store.reset(key).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires REDIS_URL"]
    async fn redis_window_rolls_over_after_expiry() {
        let store = redis_store();
        let limit = limit(1, 1);
        let key = "rate_limit:test:redis_window_rolls_over";
        store.reset(key).await.unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        assert!(store.increment(key, &limit, now).await.unwrap().admitted);
        assert!(!store.increment(key, &limit, now).await.unwrap().admitted);

        tokio::time::sleep(Duration::from_millis(1_200)).await;

        let later = chrono::Utc::now().timestamp_millis();
        let next = store.increment(key, &limit, later).await.unwrap();
        assert!(next.admitted);
        assert_eq!(next.remaining, 0);
        store.reset(key).await.unwrap();
    }
}
