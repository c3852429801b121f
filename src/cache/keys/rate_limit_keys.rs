const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Bucket key for one identity under one gated scope, so that two gated
/// endpoints never share quota.
pub fn rate_limit_key(scope: &str, identity: &str) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, scope, identity)
}
