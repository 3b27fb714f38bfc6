//! Fixed-window request counter, keyed by caller-composed strings
//! (the ingestion path uses `form-id:client-ip`).
//!
//! This is a single-process, best-effort limiter: it guards against abuse
//! bursts, not billing-accurate quotas. The durable monthly submission cap
//! is enforced separately against the store. In a multi-instance deployment
//! each instance counts independently.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug)]
pub struct RateDecision {
    pub allowed: bool,
    /// Remaining budget in the current window, floored at zero.
    pub remaining: u32,
    /// Absolute end of the current window.
    pub reset_at: Instant,
}

impl RateDecision {
    /// Whole seconds until the window resets, rounded up, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let remaining = self.reset_at.saturating_duration_since(Instant::now());
        remaining.as_secs_f64().ceil().max(1.0) as u64
    }
}

struct WindowEntry {
    count: u32,
    window_end: Instant,
}

pub struct FixedWindowLimiter {
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration) -> Self {
        FixedWindowLimiter {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request against `key` and reports whether it fits within
    /// `limit` for the current window. The first request for a new or
    /// expired key starts a fresh window.
    pub fn check(&self, key: &str, limit: u32) -> RateDecision {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if e.window_end <= now {
                    e.count = 0;
                    e.window_end = now + self.window;
                }
            })
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_end: now + self.window,
            });

        entry.count += 1;
        RateDecision {
            allowed: entry.count <= limit,
            remaining: limit.saturating_sub(entry.count),
            reset_at: entry.window_end,
        }
    }

    /// Drops expired windows to bound memory.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.lock().retain(|_, e| e.window_end > now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Periodically sweeps expired entries for the lifetime of the process.
pub fn spawn_sweeper(
    limiter: Arc<FixedWindowLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            limiter.sweep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_and_remaining() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60));

        for i in 0..3 {
            let decision = limiter.check("form:1.2.3.4", 3);
            assert!(decision.allowed, "request {i} should pass");
            assert_eq!(decision.remaining, 2 - i);
        }

        // The (N+1)th request in the window is rejected
        let decision = limiter.check("form:1.2.3.4", 3);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_secs() <= 60);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60));

        assert!(limiter.check("a", 1).allowed);
        assert!(!limiter.check("a", 1).allowed);
        assert!(limiter.check("b", 1).allowed);
    }

    #[test]
    fn test_expired_window_restarts() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(20));

        limiter.check("k", 1);
        assert!(!limiter.check("k", 1).allowed);

        std::thread::sleep(Duration::from_millis(30));
        let decision = limiter.check("k", 1);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_sweep_drops_only_expired_entries() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(20));
        limiter.check("old", 5);
        std::thread::sleep(Duration::from_millis(30));
        limiter.check("fresh", 5);

        limiter.sweep();
        assert_eq!(limiter.len(), 1);

        // Swept key starts over
        let decision = limiter.check("old", 5);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }
}
