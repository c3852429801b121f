use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::invalidation::DEFAULT_MIN_CARD_PUBLIC_ID_LEN;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
}

/// What the rate limiter does when it cannot count a request, either because
/// no identity could be derived or because the bucket store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Admit the request uncounted.
    Open,
    /// Reject the request.
    #[default]
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailurePolicy::Open),
            "closed" => Ok(FailurePolicy::Closed),
            _ => Err(ConfigError::InvalidValue {
                name: "RATE_LIMIT_FAILURE_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Largest window whose length in milliseconds still fits an `i64`.
pub const MAX_RATE_LIMIT_WINDOW_SECS: u64 = i64::MAX as u64 / 1000;

/// Quota for one gated endpoint: `points` requests per `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    points: u32,
    duration: Duration,
}

impl RateLimitConfig {
    pub fn new(points: u32, duration_secs: u64) -> Result<Self, ConfigError> {
        if points == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "points must be greater than zero".into(),
            ));
        }
        if duration_secs == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "duration must be greater than zero".into(),
            ));
        }
        if duration_secs > MAX_RATE_LIMIT_WINDOW_SECS {
            return Err(ConfigError::InvalidRateLimit(format!(
                "duration must be at most {} seconds",
                MAX_RATE_LIMIT_WINDOW_SECS
            )));
        }
        Ok(Self {
            points,
            duration: Duration::from_secs(duration_secs),
        })
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_ms(&self) -> i64 {
        i64::try_from(self.duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub redis_url: Option<String>,
    pub jwt_secret: Option<String>,
    /// Keys accepted from `x-api-key` as a rate limit identity.
    pub api_keys: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_failure_policy: FailurePolicy,
    pub rate_limit_sweep_interval_secs: u64,
    pub trust_proxy_headers: bool,
    pub card_public_id_min_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "::".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            redis_url: None,
            jwt_secret: None,
            api_keys: Vec::new(),
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
            rate_limit_failure_policy: FailurePolicy::Closed,
            rate_limit_sweep_interval_secs: 300,
            trust_proxy_headers: false,
            card_public_id_min_len: DEFAULT_MIN_CARD_PUBLIC_ID_LEN,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            api_base_uri: env::var("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            redis_url: non_empty_var("REDIS_URL"),
            jwt_secret: non_empty_var("JWT_SECRET"),
            api_keys: non_empty_var("API_KEYS")
                .map(|keys| {
                    keys.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_requests: parse_var("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_window_secs: parse_var(
                "RATE_LIMIT_WINDOW",
                defaults.rate_limit_window_secs,
            )?,
            rate_limit_failure_policy: parse_var(
                "RATE_LIMIT_FAILURE_POLICY",
                defaults.rate_limit_failure_policy,
            )?,
            rate_limit_sweep_interval_secs: parse_var(
                "RATE_LIMIT_SWEEP_INTERVAL",
                defaults.rate_limit_sweep_interval_secs,
            )?,
            trust_proxy_headers: parse_var("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers)?,
            card_public_id_min_len: parse_var(
                "CARD_PUBLIC_ID_MIN_LENGTH",
                defaults.card_public_id_min_len,
            )?,
        };

        // Fail at startup rather than on the first request.
        config.rate_limit()?;

        Ok(config)
    }

    pub fn rate_limit(&self) -> Result<RateLimitConfig, ConfigError> {
        RateLimitConfig::new(self.rate_limit_requests, self.rate_limit_window_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_interval_secs.max(1))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        _ => Ok(default),
    }
}
