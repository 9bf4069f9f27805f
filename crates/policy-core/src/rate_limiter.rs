// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Token-bucket rate limiting, keyed by `(policy_id, key_value)`.
//!
//! Buckets live outside the compiled, immutable [`crate::policy::Policy`]:
//! they are mutable runtime state shared across evaluations, guarded with
//! `parking_lot`'s `RwLock`/`Mutex` the way the OTLP receiver guards its
//! shared metrics handle — a read-mostly outer lock around per-entry
//! mutable state, rather than a single coarse lock around everything.

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// The rate-limit window unit (`rate_limit.per`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// One-second window.
    Second,
    /// One-minute window.
    Minute,
    /// One-hour window.
    Hour,
}

impl Window {
    /// Parses the wire value of `rate_limit.per`.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Some(match name {
            "second" => Window::Second,
            "minute" => Window::Minute,
            "hour" => Window::Hour,
            _ => return None,
        })
    }

    /// The window's length.
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Window::Second => Duration::from_secs(1),
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(3600),
        }
    }
}

/// A compiled `rate_limit` decision's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Bucket capacity and refill amount per window.
    pub count: u64,
    /// The window the count applies over.
    pub per: Window,
}

/// A single token bucket: `tokens` refill continuously at
/// `count / per.duration()` tokens per second, capped at `count`.
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

type BucketKey = (String, String);

/// Shared rate-limiter state for one registry. Every `rate_limit` policy
/// draws from this same bucket map, partitioned by policy id and (if
/// configured) a key attribute's value.
#[derive(Default)]
pub struct RateLimiter {
    buckets: RwLock<HashMap<BucketKey, Mutex<TokenBucket>>>,
}

impl RateLimiter {
    /// Builds an empty rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take one token from the bucket for `(policy_id, key)`,
    /// lazily creating it at full capacity on first use. Returns `true` if
    /// the record should be kept (a token was available).
    ///
    /// `key` is the empty string both when the policy has no `key` field
    /// configured and when a configured key's accessor read comes back
    /// absent — both cases share one bucket.
    pub fn try_acquire(&self, policy_id: &str, key: &str, config: &RateLimitConfig) -> bool {
        let capacity = precise_capacity(config.count);
        let refill_per_sec = capacity / config.per.duration().as_secs_f64();
        let map_key: BucketKey = (policy_id.to_string(), key.to_string());

        if let Some(bucket) = self.buckets.read().get(&map_key) {
            return bucket.lock().try_acquire(capacity, refill_per_sec);
        }

        let mut buckets = self.buckets.write();
        let bucket = buckets
            .entry(map_key)
            .or_insert_with(|| Mutex::new(TokenBucket::new(capacity)));
        bucket.lock().try_acquire(capacity, refill_per_sec)
    }
}

#[allow(clippy::cast_precision_loss)]
fn precise_capacity(count: u64) -> f64 {
    count as f64
}
