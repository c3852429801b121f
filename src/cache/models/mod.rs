/// Cached data models
pub mod card;
pub mod rate_limit;

pub use card::{CachedQuery, CardQueryKey};
pub use rate_limit::{RateLimitBucket, RateLimitOutcome};
