//! Fixed-window rate limiter keyed by URL.
//!
//! A burst straddling a window boundary can admit up to twice the limit in
//! a short span. Admission is decided and recorded under one lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-URL fixed-window admission controller.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one request for `url` if its window has room.
    ///
    /// A denial leaves the window untouched, so denials never extend it.
    pub fn check_and_consume(&self, url: &str, max_requests: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        match windows.get_mut(url) {
            Some(w) if now <= w.reset_at => {
                if w.count < max_requests {
                    w.count += 1;
                    true
                } else {
                    debug!(url, count = w.count, "Rate limit window full");
                    false
                }
            }
            _ => {
                windows.insert(
                    url.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                true
            }
        }
    }

    /// Wall-clock time the current window for `url` resets. Advisory only.
    pub fn reset_time_of(&self, url: &str) -> Option<DateTime<Utc>> {
        let reset_at = self.windows.lock().get(url)?.reset_at;
        let remaining = reset_at.saturating_duration_since(Instant::now());
        let remaining = chrono::Duration::from_std(remaining).ok()?;
        Some(Utc::now() + remaining)
    }

    /// Requests admitted in the current window of `url`.
    pub fn count_of(&self, url: &str) -> Option<u32> {
        self.windows.lock().get(url).map(|w| w.count)
    }

    /// Drop the window of `url`.
    pub fn clear(&self, url: &str) {
        self.windows.lock().remove(url);
    }

    pub fn clear_all(&self) {
        self.windows.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_max() {
        let limiter = RateLimiter::new();
        let results: Vec<bool> = (0..4)
            .map(|_| limiter.check_and_consume("u", 3, WINDOW))
            .collect();
        assert_eq!(results, vec![true, true, true, false]);
        assert_eq!(limiter.count_of("u"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.check_and_consume("u", 3, WINDOW);
        }
        assert!(!limiter.check_and_consume("u", 3, WINDOW));

        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
        assert!(limiter.check_and_consume("u", 3, WINDOW));
        assert_eq!(limiter.count_of("u"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_does_not_extend_window() {
        let limiter = RateLimiter::new();
        limiter.check_and_consume("u", 1, WINDOW);

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(!limiter.check_and_consume("u", 1, WINDOW));

        tokio::time::advance(Duration::from_millis(101)).await;
        assert!(limiter.check_and_consume("u", 1, WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_urls_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.check_and_consume("a", 1, WINDOW));
        assert!(!limiter.check_and_consume("a", 1, WINDOW));
        assert!(limiter.check_and_consume("b", 1, WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_time_and_clear() {
        let limiter = RateLimiter::new();
        assert!(limiter.reset_time_of("u").is_none());

        limiter.check_and_consume("u", 1, WINDOW);
        let reset = limiter.reset_time_of("u").unwrap();
        assert!(reset >= Utc::now());

        limiter.clear("u");
        assert!(limiter.reset_time_of("u").is_none());
        assert!(limiter.check_and_consume("u", 1, WINDOW));
    }
}
