use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;

/// High-resolution time source for capture timestamps.
pub trait Clock: Send + Sync {
    /// Milliseconds since the capture origin.
    fn now_ms(&self) -> f64;
    /// Epoch milliseconds of the capture origin.
    fn origin_epoch_ms(&self) -> f64;
}

/// Monotonic clock anchored at construction.
pub struct SystemClock {
    anchor: Instant,
    origin_epoch_ms: f64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            origin_epoch_ms: Utc::now().timestamp_millis() as f64,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.anchor.elapsed().as_secs_f64() * 1000.0
    }

    fn origin_epoch_ms(&self) -> f64 {
        self.origin_epoch_ms
    }
}

/// Clock whose reading is set explicitly; used by replays and tests.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
    origin_epoch_ms: f64,
}

impl ManualClock {
    pub fn new(origin_epoch_ms: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(0.0)),
            origin_epoch_ms,
        }
    }

    pub fn set(&self, now_ms: f64) {
        let mut guard = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = now_ms;
    }

    pub fn advance(&self, delta_ms: f64) {
        let mut guard = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard += delta_ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn origin_epoch_ms(&self) -> f64 {
        self.origin_epoch_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert!(second >= first);
        assert!(clock.origin_epoch_ms() > 1_600_000_000_000.0);
    }

    #[test]
    fn manual_clock_follows_set_and_advance() {
        let clock = ManualClock::new(1000.0);
        clock.set(5.0);
        clock.advance(2.5);
        assert_eq!(clock.now_ms(), 7.5);
        assert_eq!(clock.origin_epoch_ms(), 1000.0);
    }
}
