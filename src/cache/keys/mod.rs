/// Cache key builders shared by the Redis-backed stores.
pub mod card_keys;
pub mod rate_limit_keys;

pub use card_keys::{QUERY_INVALIDATE_CHANNEL, card_by_id_key};
pub use rate_limit_keys::rate_limit_key;
