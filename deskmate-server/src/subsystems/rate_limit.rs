//! Fixed-window request limiter keyed by tenant and caller.
//!
//! Process-local: counters reset on restart and are not shared between
//! server instances.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use deskmate_core::config::RateLimitConfig;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Rate limit exceeded, retry in {retry_after_secs}s")]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.requests_per_window,
            window: Duration::from_secs(config.window_seconds.max(1)),
            windows: DashMap::new(),
        }
    }

    /// Count one request for `key`. A limit of 0 disables limiting.
    pub fn check(&self, key: &str) -> Result<(), RateLimited> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimited> {
        if self.limit == 0 {
            return Ok(());
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let remaining = self.window.saturating_sub(elapsed);
            return Err(RateLimited {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have expired. Keeps the map bounded on long-running servers.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            requests_per_window: limit,
            window_seconds: secs,
        })
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let rl = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(rl.check_at("t1:alice", now).is_ok());
        }
        let err = rl.check_at("t1:alice", now).unwrap_err();
        assert!(err.retry_after_secs >= 1);

        // other keys are independent
        assert!(rl.check_at("t1:bob", now).is_ok());
    }

    #[test]
    fn test_window_resets() {
        let rl = limiter(1, 10);
        let start = Instant::now();
        assert!(rl.check_at("k", start).is_ok());
        assert!(rl.check_at("k", start + Duration::from_secs(5)).is_err());
        assert!(rl.check_at("k", start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_sweep_drops_expired_windows() {
        let rl = limiter(5, 10);
        let start = Instant::now();
        rl.check_at("old", start).unwrap();
        rl.check_at("new", start + Duration::from_secs(8)).unwrap();
        assert_eq!(rl.tracked_keys(), 2);

        rl.sweep_at(start + Duration::from_secs(12));
        assert_eq!(rl.tracked_keys(), 1);
    }

    #[test]
    fn test_zero_limit_disables() {
        let rl = limiter(0, 60);
        for _ in 0..100 {
            assert!(rl.check("k").is_ok());
        }
        assert_eq!(rl.tracked_keys(), 0);
    }
}
