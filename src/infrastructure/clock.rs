use crate::domain::ports::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock adapter. Monotonicity is enforced by never reporting a value
/// below the last one observed, so system clock steps backwards are absorbed.
#[derive(Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.last.fetch_max(wall, Ordering::SeqCst).max(wall)
    }
}

/// Externally driven clock for deterministic replays and tests.
///
/// `Clone` shares the underlying counter, so a handle kept by the driver
/// advances the clock seen by the service. Advancing to an earlier time is a
/// no-op; the clock never moves backwards.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    pub fn advance_to(&self, now: u64) {
        self.now.fetch_max(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(100);
        clock.advance_to(50);
        assert_eq!(clock.now(), 100);
        clock.advance_to(200);
        assert_eq!(clock.now(), 200);
    }

    #[test]
    fn test_manual_clock_handles_share_state() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();
        handle.advance_to(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
