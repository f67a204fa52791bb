// src/utils/time.rs
//! Snapshot timestamps
//!
//! The capture loop stamps every snapshot through a `TimeProvider` so tests
//! can substitute a controllable clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of nanosecond timestamps
pub trait TimeProvider: Send + Sync {
    fn now_nanos(&self) -> u64;

    fn now_micros(&self) -> u64 {
        self.now_nanos() / 1000
    }
}

/// Wall clock, nanoseconds since the Unix epoch
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Wall clock anchored once, then advanced by a monotonic clock
///
/// Timestamps never go backwards even if the system clock is adjusted.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeProvider {
    anchor_nanos: u64,
    anchor: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self {
            anchor_nanos: current_timestamp_nanos(),
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.anchor_nanos + self.anchor.elapsed().as_nanos() as u64
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Nanoseconds since the Unix epoch, zero if the clock is before it
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_never_goes_back() {
        let clock = MonotonicTimeProvider::new();
        let mut last = clock.now_nanos();
        for _ in 0..1000 {
            let now = clock.now_nanos();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_mock_clock() {
        let clock = MockTimeProvider::new(1_000);
        clock.advance_by(500);
        assert_eq!(clock.now_nanos(), 1_500);
        assert_eq!(clock.now_micros(), 1);
        clock.set_time(42);
        assert_eq!(clock.now_nanos(), 42);
    }

    #[test]
    fn test_system_clock_after_epoch() {
        assert!(SystemTimeProvider.now_nanos() > 0);
    }
}
