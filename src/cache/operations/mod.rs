/// Cache operations
pub mod card;
pub mod rate_limit;

pub use card::{MemoryQueryCache, QueryCache, RedisQueryCache};
pub use rate_limit::{MemoryRateLimitStore, RateLimitStore, RedisRateLimitStore};
