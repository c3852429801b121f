use serde::{Deserialize, Serialize};

/// Usage of one identity within its current fixed window.
///
/// Timestamps are Unix milliseconds. The window covers
/// `[window_start, window_start + duration_ms)`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub count: u32,
    pub window_start: i64,
    pub duration_ms: i64,
}

impl RateLimitBucket {
    pub fn new(now: i64, duration_ms: i64) -> Self {
        Self {
            count: 0,
            window_start: now,
            duration_ms,
        }
    }

    pub fn reset_at(&self) -> i64 {
        self.window_start.saturating_add(self.duration_ms)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.reset_at()
    }

    pub fn reset(&mut self, now: i64, duration_ms: i64) {
        self.count = 0;
        self.window_start = now;
        self.duration_ms = duration_ms;
    }
}

/// Result of a single check-and-increment against a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix milliseconds at which the current window ends.
    pub reset_at: i64,
}

impl RateLimitOutcome {
    /// Whole seconds until the window ends, never less than one.
    pub fn retry_after_secs(&self, now: i64) -> u64 {
        let ms = self.reset_at.saturating_sub(now).max(0) as u64;
        ms.div_ceil(1000).max(1)
    }
}
