// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock trait - passive monotonic time reference shared by capture and render.
//!
//! Capture timestamps, phase entry times and the render tick's "now" must all
//! come from the same clock, otherwise delayed lookups land on the wrong
//! frames.

use std::time::Duration;

/// Passive monotonic clock in microseconds.
///
/// - **Passive**: the clock provides `now_us()`, the render loop decides when
///   to tick
/// - **Thread-safe**: all methods can be called from the capture callback and
///   the render thread concurrently
///
/// ## Implementations
///
/// - `SoftwareClock`: `Instant`-based, for live sessions
/// - `ManualClock`: explicitly set, for tests and offline replay
pub trait Clock: Send + Sync {
    /// Current time in microseconds since the clock's epoch.
    ///
    /// Guaranteed to be monotonically non-decreasing.
    fn now_us(&self) -> u64;

    /// Current time as Duration (convenience)
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us())
    }

    /// Human-readable clock description, used in logs.
    fn description(&self) -> &str;
}
