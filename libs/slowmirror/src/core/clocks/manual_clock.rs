// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::Clock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Clock whose time only moves when told to.
///
/// Used to drive sessions deterministically in tests and when replaying
/// recorded captures. Setting a time earlier than the current one is ignored
/// so the clock stays monotonic.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        Self {
            now_us: AtomicU64::new(start_us),
        }
    }

    /// Move the clock to `now_us` (no-op if that would go backwards).
    pub fn set_us(&self, now_us: u64) {
        self.now_us.fetch_max(now_us, Ordering::AcqRel);
    }

    /// Advance the clock by `delta_us` and return the new time.
    pub fn advance_us(&self, delta_us: u64) -> u64 {
        self.now_us.fetch_add(delta_us, Ordering::AcqRel) + delta_us
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }

    fn description(&self) -> &str {
        "Manual Clock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(5);
        assert_eq!(clock.now_us(), 5);

        clock.set_us(1_000);
        assert_eq!(clock.now_us(), 1_000);

        assert_eq!(clock.advance_us(500), 1_500);
        assert_eq!(clock.now_us(), 1_500);
    }

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(10_000);
        clock.set_us(2_000);
        assert_eq!(clock.now_us(), 10_000);
    }
}
