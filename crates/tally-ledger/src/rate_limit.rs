//! Sliding-window rate limiter.
//!
//! Process-local and in-memory: state loss on restart is acceptable, and
//! approximate limiting under concurrency is within tolerance. The
//! service layer invokes [`RateLimiter::check`] before every gated
//! mutation endpoint and runs [`RateLimiter::sweep`] on a periodic task
//! to bound memory.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A sliding-window counter keyed by an arbitrary string
/// (e.g. `consume:{user_id}`).
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,

    /// Time until the window frees a slot; zero when allowed.
    pub retry_after: Duration,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and record a request for `key`.
    ///
    /// Prunes timestamps older than the window, rejects when the
    /// remaining count has reached `max_requests` (reporting the time
    /// until the oldest timestamp leaves the window), and otherwise
    /// records the request.
    pub fn check(&self, key: &str, window: Duration, max_requests: usize) -> RateDecision {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let stamps = entries.entry(key.to_owned()).or_default();

        stamps.retain(|stamp| now.duration_since(*stamp) < window);

        if stamps.len() >= max_requests {
            let oldest = stamps.first().copied().unwrap_or(now);
            return RateDecision {
                allowed: false,
                retry_after: window.saturating_sub(now.duration_since(oldest)),
            };
        }

        stamps.push(now);
        RateDecision {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    /// Drop keys with no timestamps inside the window.
    pub fn sweep(&self, window: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, stamps| {
            stamps.retain(|stamp| now.duration_since(*stamp) < window);
            !stamps.is_empty()
        });
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const WINDOW: Duration = Duration::from_millis(50);

    #[test]
    fn allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.check("k", WINDOW, 3).allowed);
        }

        let decision = limiter.check("k", WINDOW, 3);
        assert!(!decision.allowed);
        assert!(decision.retry_after > Duration::ZERO);
        assert!(decision.retry_after <= WINDOW);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();

        assert!(limiter.check("consume:a", WINDOW, 1).allowed);
        assert!(!limiter.check("consume:a", WINDOW, 1).allowed);
        assert!(limiter.check("consume:b", WINDOW, 1).allowed);
    }

    #[test]
    fn window_expiry_frees_slots() {
        let limiter = RateLimiter::new();

        assert!(limiter.check("k", WINDOW, 1).allowed);
        assert!(!limiter.check("k", WINDOW, 1).allowed);

        sleep(WINDOW + Duration::from_millis(10));
        assert!(limiter.check("k", WINDOW, 1).allowed);
    }

    #[test]
    fn sweep_drops_idle_keys() {
        let limiter = RateLimiter::new();

        limiter.check("stale", WINDOW, 5);
        sleep(WINDOW + Duration::from_millis(10));
        limiter.check("fresh", WINDOW, 5);

        assert_eq!(limiter.tracked_keys(), 2);
        limiter.sweep(WINDOW);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
