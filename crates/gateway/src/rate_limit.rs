//! Token bucket rate limiter for node traffic
//!
//! Every node response is checked against a global bucket and a bucket for
//! its sender address. Over-budget messages are rejected; the caller drops
//! them silently.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

/// Rate limiter configuration (requests per second and burst size)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    #[serde(default = "default_global_rps")]
    pub global_rps: f64,
    #[serde(default = "default_global_burst")]
    pub global_burst: u32,
    #[serde(default = "default_per_sender_rps")]
    pub per_sender_rps: f64,
    #[serde(default = "default_per_sender_burst")]
    pub per_sender_burst: u32,
}

fn default_global_rps() -> f64 {
    1000.0
}

fn default_global_burst() -> u32 {
    1000
}

fn default_per_sender_rps() -> f64 {
    100.0
}

fn default_per_sender_burst() -> u32 {
    100
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            global_rps: default_global_rps(),
            global_burst: default_global_burst(),
            per_sender_rps: default_per_sender_rps(),
            per_sender_burst: default_per_sender_burst(),
        }
    }
}

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_update: Instant,
}

impl TokenBucket {
    fn new(rps: f64, burst: u32) -> Self {
        TokenBucket {
            tokens: burst as f64,
            capacity: burst as f64,
            refill_rate: rps.max(0.0),
            last_update: Instant::now(),
        }
    }

    fn has_token(&mut self) -> bool {
        self.refill();
        self.tokens >= 1.0
    }

    fn take(&mut self) {
        self.tokens -= 1.0;
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update);
        let new_tokens = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + new_tokens).min(self.capacity);
        self.last_update = now;
    }
}

/// Global plus per-sender token buckets, safe for concurrent use
#[derive(Clone)]
pub struct NodeRateLimiter {
    config: RateLimiterConfig,
    global: Arc<Mutex<TokenBucket>>,
    /// Per-sender state, keyed by lower-cased address
    senders: Arc<DashMap<String, Mutex<TokenBucket>>>,
}

impl NodeRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let global = TokenBucket::new(config.global_rps, config.global_burst);
        NodeRateLimiter {
            config,
            global: Arc::new(Mutex::new(global)),
            senders: Arc::new(DashMap::new()),
        }
    }

    /// Consume one token from both buckets. Nothing is consumed unless both allow it.
    pub fn allow(&self, sender: &str) -> bool {
        let sender = sender.to_lowercase();
        let entry = self.senders.entry(sender).or_insert_with(|| {
            Mutex::new(TokenBucket::new(
                self.config.per_sender_rps,
                self.config.per_sender_burst,
            ))
        });

        let mut sender_bucket = entry.lock();
        let mut global = self.global.lock();
        if !sender_bucket.has_token() || !global.has_token() {
            return false;
        }
        sender_bucket.take();
        global.take();
        true
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl Default for NodeRateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
