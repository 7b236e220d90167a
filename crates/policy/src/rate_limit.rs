//! Sliding-window request limiter keyed by identifier.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    requests: DashMap<String, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Record a request for `identifier` if it is under the limit.
    pub fn check(&self, identifier: &str) -> bool {
        self.check_at(identifier, Instant::now())
    }

    pub fn check_at(&self, identifier: &str, now: Instant) -> bool {
        let mut entry = self.requests.entry(identifier.to_string()).or_default();
        let window_start = now.checked_sub(self.window);
        while let Some(&oldest) = entry.front() {
            match window_start {
                Some(start) if oldest <= start => {
                    entry.pop_front();
                }
                _ => break,
            }
        }

        if entry.len() >= self.max_requests {
            return false;
        }
        entry.push_back(now);
        true
    }
}
