//! # Sliding-Window Limiter
//!
//! At most `max_events` per key inside any window of length `window`.
//!
//! ```text
//!   window = 2s, max_events = 3
//!
//!   t:  0.0   0.4   0.9   1.5          2.1
//!        ●     ●     ●     ✗ (retry in 0.5s)   ● (0.0 slid out)
//! ```
//!
//! Unlike a fixed window there is no reset edge to burst across. The
//! limiter takes `now` explicitly and holds no lock; callers that share it
//! wrap it in a mutex.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter<K> {
    max_events: usize,
    window: Duration,
    log: HashMap<K, VecDeque<Instant>>,
}

impl<K: Eq + Hash + Clone> SlidingWindowLimiter<K> {
    /// A limiter with `max_events` of zero rejects everything.
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            log: HashMap::new(),
        }
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn evict(events: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(&oldest) = events.front() {
            if now.saturating_duration_since(oldest) >= window {
                events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records an event for `key` if allowed.
    ///
    /// Returns `Err(retry_after)` when the key is over its budget; a
    /// rejected attempt is not recorded.
    pub fn check_at(&mut self, key: &K, now: Instant) -> Result<(), Duration> {
        let window = self.window;
        let events = self.log.entry(key.clone()).or_default();
        Self::evict(events, window, now);

        if events.len() < self.max_events {
            events.push_back(now);
            return Ok(());
        }

        let retry_after = events
            .front()
            .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(window);
        Err(retry_after)
    }

    /// Events currently counted against `key`.
    pub fn in_window(&mut self, key: &K, now: Instant) -> usize {
        let window = self.window;
        match self.log.get_mut(key) {
            Some(events) => {
                Self::evict(events, window, now);
                events.len()
            }
            None => 0,
        }
    }

    /// Forgets `key`.
    pub fn reset(&mut self, key: &K) {
        self.log.remove(key);
    }

    /// Drops keys whose events have all slid out of the window.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.log.retain(|_, events| {
            Self::evict(events, window, now);
            !events.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.log.len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let t0 = Instant::now();
        let mut l = SlidingWindowLimiter::new(3, ms(2000));
        assert!(l.check_at(&"op", t0).is_ok());
        assert!(l.check_at(&"op", t0 + ms(400)).is_ok());
        assert!(l.check_at(&"op", t0 + ms(900)).is_ok());
        assert_eq!(l.check_at(&"op", t0 + ms(1500)), Err(ms(500)));
    }

    #[test]
    fn test_window_slides() {
        let t0 = Instant::now();
        let mut l = SlidingWindowLimiter::new(2, ms(1000));
        l.check_at(&"op", t0).unwrap();
        l.check_at(&"op", t0 + ms(600)).unwrap();
        assert!(l.check_at(&"op", t0 + ms(999)).is_err());
        // The event at t0 leaves the window at exactly t0 + 1000ms.
        assert!(l.check_at(&"op", t0 + ms(1000)).is_ok());
        assert!(l.check_at(&"op", t0 + ms(1100)).is_err());
    }

    #[test]
    fn test_rejected_attempts_are_not_counted() {
        let t0 = Instant::now();
        let mut l = SlidingWindowLimiter::new(1, ms(1000));
        l.check_at(&"op", t0).unwrap();
        for i in 1..10 {
            assert!(l.check_at(&"op", t0 + ms(i * 50)).is_err());
        }
        assert_eq!(l.in_window(&"op", t0 + ms(500)), 1);
        assert!(l.check_at(&"op", t0 + ms(1000)).is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let t0 = Instant::now();
        let mut l = SlidingWindowLimiter::new(1, ms(1000));
        l.check_at(&"cajero-1", t0).unwrap();
        assert!(l.check_at(&"cajero-2", t0).is_ok());
        assert!(l.check_at(&"cajero-1", t0).is_err());
    }

    #[test]
    fn test_prune_and_reset() {
        let t0 = Instant::now();
        let mut l = SlidingWindowLimiter::new(5, ms(100));
        l.check_at(&"a", t0).unwrap();
        l.check_at(&"b", t0 + ms(80)).unwrap();
        l.prune(t0 + ms(150));
        assert_eq!(l.tracked_keys(), 1);
        l.reset(&"b");
        assert_eq!(l.tracked_keys(), 0);
    }

    #[test]
    fn test_zero_budget_rejects_everything() {
        let mut l = SlidingWindowLimiter::new(0, ms(100));
        assert_eq!(l.check_at(&"a", Instant::now()), Err(ms(100)));
    }
}
