//! crates/course_ratings_core/src/rate_limit.rs
//!
//! Process-local fixed-window limiter. Counters live only in this process and
//! are lost on restart; deployments with more than one instance use the shared
//! store adapter instead.

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};

use crate::ports::{PortResult, RateLimiter};

/// Actions allowed per identifier inside one window.
pub const RATE_LIMIT_MAX: u32 = 10;
/// Length of the window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-memory `RateLimiter` keyed by arbitrary identifier strings.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    windows: DashMap<String, Window>,
    max_actions: u32,
    window: Duration,
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRateLimiter {
    /// 10 actions per 60 seconds.
    pub fn new() -> Self {
        Self::with_limits(RATE_LIMIT_MAX, RATE_LIMIT_WINDOW)
    }

    pub fn with_limits(max_actions: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_actions,
            window,
        }
    }

    /// Records an action at `now`.
    ///
    /// A missing or expired entry restarts the window with a count of one; a
    /// full window denies without touching the entry.
    pub fn check_at(&self, identifier: &str, now: Instant) -> bool {
        match self.windows.entry(identifier.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Window {
                    count: 1,
                    reset_at: now + self.window,
                });
                true
            }
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if now > window.reset_at {
                    *window = Window {
                        count: 1,
                        reset_at: now + self.window,
                    };
                    true
                } else if window.count >= self.max_actions {
                    false
                } else {
                    window.count += 1;
                    true
                }
            }
        }
    }

    /// Drops entries whose window has elapsed.
    pub fn purge_expired(&self, now: Instant) {
        self.windows.retain(|_, window| now <= window.reset_at);
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, identifier: &str) -> PortResult<bool> {
        Ok(self.check_at(identifier, Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_ten_then_denies_within_window() {
        let limiter = InMemoryRateLimiter::new();
        let start = Instant::now();

        for i in 0..10 {
            let now = start + Duration::from_secs(i);
            assert!(limiter.check_at("avaliacao_u1", now), "call {} should pass", i + 1);
        }
        assert!(!limiter.check_at("avaliacao_u1", start + Duration::from_secs(30)));
        assert!(!limiter.check_at("avaliacao_u1", start + Duration::from_secs(60)));
    }

    #[test]
    fn window_elapse_resets_count() {
        let limiter = InMemoryRateLimiter::new();
        let start = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at("k", start));
        }
        assert!(!limiter.check_at("k", start));

        let later = start + RATE_LIMIT_WINDOW + Duration::from_millis(1);
        assert!(limiter.check_at("k", later));
        for _ in 0..9 {
            assert!(limiter.check_at("k", later));
        }
        assert!(!limiter.check_at("k", later));
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = InMemoryRateLimiter::with_limits(1, RATE_LIMIT_WINDOW);
        let now = Instant::now();
        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
    }

    #[test]
    fn purge_drops_only_expired_windows() {
        let limiter = InMemoryRateLimiter::new();
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(50));

        limiter.purge_expired(start + Duration::from_secs(61));
        assert_eq!(limiter.tracked_identifiers(), 1);
    }

    #[tokio::test]
    async fn port_impl_uses_wall_clock() {
        let limiter = InMemoryRateLimiter::with_limits(2, RATE_LIMIT_WINDOW);
        assert!(limiter.check("x").await.unwrap());
        assert!(limiter.check("x").await.unwrap());
        assert!(!limiter.check("x").await.unwrap());
    }
}
