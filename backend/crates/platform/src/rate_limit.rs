//! Rate Limiting Infrastructure
//!
//! Fixed-window counters held in process memory. Buckets are not persisted
//! and vanish on restart.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// Wall-clock reset time, Unix epoch milliseconds
    pub reset_at_ms: i64,
    /// Time left until the window resets
    pub retry_after: Duration,
}

impl RateLimitResult {
    /// Seconds for a `Retry-After` header, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs_f64().ceil().max(1.0) as u64
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Per-key fixed-window counter.
///
/// Each key's read-increment-write happens under its map shard lock, so
/// concurrent requests for one key never lose an increment.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `key` and report whether it is allowed.
    pub fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.check_at(key, config, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub fn check_at(&self, key: &str, config: &RateLimitConfig, now: Instant) -> RateLimitResult {
        let mut entry = self.buckets.entry(key.to_owned()).or_insert(Bucket {
            count: 0,
            reset_at: now + config.window,
        });

        if now >= entry.reset_at {
            *entry = Bucket {
                count: 0,
                reset_at: now + config.window,
            };
        }
        entry.count = entry.count.saturating_add(1);

        let bucket = *entry;
        drop(entry);

        let retry_after = bucket.reset_at.saturating_duration_since(now);
        RateLimitResult {
            allowed: bucket.count <= config.max_requests,
            remaining: config.max_requests.saturating_sub(bucket.count),
            reset_at_ms: epoch_ms_after(retry_after),
            retry_after,
        }
    }

    /// Drop buckets whose window has passed. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.reset_at > now);
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn epoch_ms_after(delta: Duration) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + delta).as_millis() as i64
}
