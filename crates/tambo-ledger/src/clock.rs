//! # Clock
//!
//! The service reads "now" through [`Clock`] so tests can walk a register
//! across midnight without sleeping.
//!
//! Two readings are needed: wall time (`DateTime<Utc>`) for business days and
//! timestamps, and a monotonic [`Instant`] for the limiter and the caches.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn instant(&self) -> Instant;
}

/// The real clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// `advance` moves wall time and the monotonic reading together; `set` jumps
/// wall time only.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    base: Instant,
    elapsed: Duration,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            state: Mutex::new(ManualState {
                now,
                base: Instant::now(),
                elapsed: Duration::ZERO,
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        if let Ok(delta) = chrono::Duration::from_std(by) {
            state.now += delta;
        }
        state.elapsed += by;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.lock().now = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // The state is two plain values; a poisoned lock still holds them.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn instant(&self) -> Instant {
        let state = self.lock();
        state.base + state.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_moves_both_readings() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let i0 = clock.instant();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
        assert_eq!(clock.instant() - i0, Duration::from_secs(90));
    }

    #[test]
    fn test_set_does_not_move_instant() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let i0 = clock.instant();

        let later = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
        clock.set(later);

        assert_eq!(clock.now(), later);
        assert_eq!(clock.instant(), i0);
    }
}
