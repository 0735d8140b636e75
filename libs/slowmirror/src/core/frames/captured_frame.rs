// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::PixelBuffer;

/// One camera frame as stored in the frame queue.
///
/// Read-only once enqueued; shared as `Arc<CapturedFrame>` with the render
/// loop and the compositor so eviction never invalidates a frame in flight.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Capture time on the session clock, in microseconds.
    pub timestamp_us: u64,
    /// Monotonically increasing per session.
    pub sequence: u64,
    pub pixels: PixelBuffer,
}

impl CapturedFrame {
    pub fn new(timestamp_us: u64, sequence: u64, pixels: PixelBuffer) -> Self {
        Self {
            timestamp_us,
            sequence,
            pixels,
        }
    }
}
