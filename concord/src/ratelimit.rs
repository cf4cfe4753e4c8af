//! Per-client sliding-window rate limiter with a penalty box
//!
//! Each identity keeps the instants of its recent requests. A request is
//! counted against every request made in the trailing `window`; going over
//! `max_requests` puts the identity in the penalty box for a flat `penalty`.
//! Requests made while in the penalty box are rejected without being recorded.
//!
//! Records are created on first use and never evicted, so memory grows with the
//! number of distinct identities seen by the process.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
    pub penalty: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(10),
            penalty: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct RateLimiterRecord {
    recent_requests: VecDeque<Instant>,
    penalty_until: Option<Instant>,
}

/// Thread-safe limiter shared by every request handler
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    records: Mutex<HashMap<String, RateLimiterRecord>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request from `identity` at `now` and decide whether it may run.
    pub fn admit(&self, identity: &str, now: Instant) -> bool {
        let mut records = self.records.lock();
        let record = records.entry(identity.to_string()).or_default();

        if record.penalty_until.is_some_and(|until| now < until) {
            return false;
        }

        // timestamps are appended in order, so expired ones are at the front
        while record
            .recent_requests
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.config.window)
        {
            record.recent_requests.pop_front();
        }
        record.recent_requests.push_back(now);

        if record.recent_requests.len() > self.config.max_requests {
            record.penalty_until = Some(now + self.config.penalty);
            tracing::info!(
                identity,
                requests = record.recent_requests.len(),
                penalty_secs = self.config.penalty.as_secs(),
                "rate limit exceeded"
            );
            return false;
        }

        true
    }

    /// Number of identities with a record
    pub fn tracked_identities(&self) -> usize {
        self.records.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
