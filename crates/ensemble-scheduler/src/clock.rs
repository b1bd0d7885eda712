//! Clock abstraction so timers can run against wall time or a virtual clock

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of "now" for everything that schedules or timestamps work
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock anchored to `tokio::time::Instant`.
///
/// Reads advance with the tokio timer, so a paused runtime
/// (`#[tokio::test(start_paused = true)]`) drives it deterministically.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor_instant: tokio::time::Instant::now(),
        }
    }

    /// Convert a wall-clock deadline into a tokio instant for `sleep_until`
    pub fn instant_at(&self, at: DateTime<Utc>) -> tokio::time::Instant {
        let offset = (at - self.anchor_wall).to_std().unwrap_or(Duration::ZERO);
        self.anchor_instant + offset
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.anchor_instant.elapsed();
        self.anchor_wall
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Manually advanced clock for tests and simulations.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Start at the Unix epoch, which keeps test timestamps readable
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += delta;
    }

    /// Move to an absolute time. Moving backwards is ignored.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if at > *now {
            *now = at;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_epoch();
        let start = clock.now();
        clock.advance(Duration::from_millis(1500));
        assert_eq!((clock.now() - start).num_milliseconds(), 1500);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::at_epoch();
        let other = clock.clone();
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now(), other.now());
    }

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::from_secs(10));
        let before = clock.now();
        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(clock.now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now();
        tokio::time::advance(Duration::from_millis(2500)).await;
        assert_eq!((clock.now() - start).num_milliseconds(), 2500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_instant_roundtrip() {
        let clock = TokioClock::new();
        let deadline = clock.now() + chrono::Duration::milliseconds(1000);
        let instant = clock.instant_at(deadline);
        assert_eq!(
            instant - tokio::time::Instant::now(),
            Duration::from_millis(1000)
        );
    }
}
