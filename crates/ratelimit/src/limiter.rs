//! Per-client admission gate (§4.5). Client identity is whatever the
//! dispatcher decides it is — a masked API-key prefix or a remote IP —
//! passed in as a plain string key.

use std::time::Duration;

use dashmap::DashMap;

use crate::bucket::TokenBucket;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub enabled: bool,
    pub requests_per_min: u32,
    pub burst_size: u32,
    pub cleanup_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_min: 600,
            burst_size: 20,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admitted,
    Rejected,
}

/// The bucket map: `DashMap` gives per-shard locking, which stands in for
/// the spec's "read-locked to find bucket, write-locked only for
/// insertion" discipline without a single global lock. `entry().or_insert_with()`
/// holds the shard's write lock across the find-or-create, so two
/// concurrent first-use requests for the same client can't each build a
/// fresh bucket and clobber one another's consumed token.
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Admits or rejects a request for `client_id`, creating the bucket on
    /// first use. Always admits when rate limiting is disabled.
    pub fn admit(&self, client_id: &str) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::Admitted;
        }

        let refill_per_sec = self.config.requests_per_min as f64 / 60.0;
        let admitted = self
            .buckets
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.burst_size, refill_per_sec))
            .try_acquire();

        if admitted {
            RateLimitDecision::Admitted
        } else {
            RateLimitDecision::Rejected
        }
    }

    /// Removes buckets idle for more than 5 minutes (§3). Intended to be
    /// run periodically by a background task at `cleanup_interval`.
    pub fn sweep_idle(&self) -> usize {
        let idle_threshold = Duration::from_secs(300);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.idle_for() < idle_threshold);
        before - self.buckets.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
