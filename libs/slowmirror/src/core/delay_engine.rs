// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Chooses which buffered frame the mirror shows and how deteriorated it is.

use std::sync::Arc;

use crate::core::config::{PrefParams, SessionConfig};
use crate::core::frame_queue::FrameQueue;
use crate::core::frames::CapturedFrame;
use crate::core::phase::Phase;
use crate::core::timing::{clamp01, delta_secs, secs_to_us};

/// A frame picked for display.
#[derive(Debug, Clone)]
pub struct ResolvedFrame {
    pub frame: Arc<CapturedFrame>,
    /// The time the mirror is showing (may be later than the frame's own
    /// timestamp when the camera is slower than the display).
    pub target_us: u64,
    /// Visual degradation in `[0, 1]`; 0 is intact.
    pub deterioration_weight: f64,
}

#[derive(Debug, Clone)]
pub enum DelayResolution {
    Ready(ResolvedFrame),
    /// No buffered frame covers the target time yet (session start, camera
    /// just enabled, or the delay reaches past retained history).
    NoFrameYet { target_us: u64 },
}

impl DelayResolution {
    pub fn ready(self) -> Option<ResolvedFrame> {
        match self {
            Self::Ready(resolved) => Some(resolved),
            Self::NoFrameYet { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

pub struct DelayEngine {
    queue: Arc<FrameQueue>,
    deterioration_start_secs: f64,
    deterioration_time_secs: f64,
    /// Target held since entering Frozen.
    freeze_target_us: Option<u64>,
}

impl DelayEngine {
    pub fn new(queue: Arc<FrameQueue>, params: &PrefParams, session: &SessionConfig) -> Self {
        let mut engine = Self {
            queue,
            deterioration_start_secs: session.sanitized().deterioration_start_secs,
            deterioration_time_secs: 0.0,
            freeze_target_us: None,
        };
        engine.update_preferences(params);
        engine
    }

    /// Pick up a changed `deterioration_time`.
    pub fn update_preferences(&mut self, params: &PrefParams) {
        self.deterioration_time_secs = params.sanitized().deterioration_time;
    }

    pub fn freeze_target_us(&self) -> Option<u64> {
        self.freeze_target_us
    }

    /// Forget the held freeze point (Frozen left, or restart).
    pub fn reset(&mut self) {
        self.freeze_target_us = None;
    }

    /// Resolve the frame to show at `now_us` in `phase`, lagging by
    /// `delay_secs` during delayed phases.
    ///
    /// - Live phases: target is `now`, no deterioration.
    /// - Delayed phases: target is `now - delay`.
    /// - Frozen: target is fixed at the value it had on entering Frozen.
    pub fn resolve(&mut self, now_us: u64, phase: Phase, delay_secs: f64) -> DelayResolution {
        let target_us = self.target_for(now_us, phase, delay_secs);
        let deterioration_weight = if phase.is_delayed() {
            self.deterioration_weight(now_us, target_us)
        } else {
            0.0
        };

        match self.queue.lookup(target_us) {
            Some(frame) => DelayResolution::Ready(ResolvedFrame {
                frame,
                target_us,
                deterioration_weight,
            }),
            None => {
                tracing::trace!("No frame at or before {}us yet", target_us);
                DelayResolution::NoFrameYet { target_us }
            }
        }
    }

    /// `clamp01((now - target - start) / deterioration_time)`.
    pub fn deterioration_weight(&self, now_us: u64, target_us: u64) -> f64 {
        let aged = delta_secs(now_us, target_us) - self.deterioration_start_secs;
        clamp01(aged / self.deterioration_time_secs)
    }

    fn target_for(&mut self, now_us: u64, phase: Phase, delay_secs: f64) -> u64 {
        let delayed = now_us.saturating_sub(secs_to_us(delay_secs));
        match phase {
            Phase::Frozen => *self.freeze_target_us.get_or_insert_with(|| {
                tracing::debug!("Freezing mirror at {}us", delayed);
                delayed
            }),
            other => {
                self.freeze_target_us = None;
                if other.is_delayed() {
                    delayed
                } else {
                    now_us
                }
            }
        }
    }
}

impl std::fmt::Debug for DelayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayEngine")
            .field("deterioration_start_secs", &self.deterioration_start_secs)
            .field("deterioration_time_secs", &self.deterioration_time_secs)
            .field("freeze_target_us", &self.freeze_target_us)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame_queue::FrameQueueConfig;
    use crate::core::frames::{PixelBuffer, PixelFormat};

    const SEC: u64 = 1_000_000;

    fn queue_with_seconds(range: std::ops::RangeInclusive<u64>) -> Arc<FrameQueue> {
        let queue = Arc::new(FrameQueue::new(FrameQueueConfig {
            capacity: 1_000,
            retention_us: 1_000 * SEC,
        }));
        for s in range {
            queue
                .enqueue(CapturedFrame::new(
                    s * SEC,
                    s,
                    PixelBuffer::blank(1, 1, PixelFormat::Gray8),
                ))
                .unwrap();
        }
        queue
    }

    fn engine(queue: Arc<FrameQueue>, deterioration_time: f64, start: f64) -> DelayEngine {
        let params = PrefParams {
            deterioration_time,
            ..PrefParams::default()
        };
        let session = SessionConfig {
            deterioration_start_secs: start,
            ..SessionConfig::default()
        };
        DelayEngine::new(queue, &params, &session)
    }

    #[test]
    fn test_delayed_scenario() {
        let mut engine = engine(queue_with_seconds(0..=10), 2.0, 1.0);
        let resolved = engine.resolve(10 * SEC, Phase::Delayed, 5.0).ready().unwrap();

        assert_eq!(resolved.frame.timestamp_us, 5 * SEC);
        assert_eq!(resolved.target_us, 5 * SEC);
        // clamp01((10 - 5 - 1) / 2) = 1.0
        assert_eq!(resolved.deterioration_weight, 1.0);
    }

    #[test]
    fn test_deterioration_weight_partial() {
        let mut engine = engine(queue_with_seconds(0..=10), 2.0, 4.0);
        let resolved = engine.resolve(10 * SEC, Phase::Delayed, 5.0).ready().unwrap();
        // (10 - 5 - 4) / 2 = 0.5
        assert!((resolved.deterioration_weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_no_delay_shows_latest_intact() {
        let mut engine = engine(queue_with_seconds(0..=10), 2.0, 0.0);
        let resolved = engine.resolve(10 * SEC + 500, Phase::NoDelay, 5.0).ready().unwrap();
        assert_eq!(resolved.frame.timestamp_us, 10 * SEC);
        assert_eq!(resolved.deterioration_weight, 0.0);
    }

    #[test]
    fn test_frozen_holds_target() {
        let queue = queue_with_seconds(0..=10);
        let mut engine = engine(Arc::clone(&queue), 10.0, 0.0);

        let first = engine.resolve(8 * SEC, Phase::Frozen, 2.0).ready().unwrap();
        assert_eq!(first.target_us, 6 * SEC);

        for s in 11..=20 {
            queue
                .enqueue(CapturedFrame::new(
                    s * SEC,
                    s,
                    PixelBuffer::blank(1, 1, PixelFormat::Gray8),
                ))
                .unwrap();
        }
        let later = engine.resolve(16 * SEC, Phase::Frozen, 7.0).ready().unwrap();
        assert_eq!(later.frame.timestamp_us, 6 * SEC, "frozen frame must not advance");
        assert!(later.deterioration_weight > first.deterioration_weight);
        assert_eq!(engine.freeze_target_us(), Some(6 * SEC));

        engine.resolve(17 * SEC, Phase::CameraFadeOut, 7.0);
        assert_eq!(engine.freeze_target_us(), None);
    }

    #[test]
    fn test_history_not_yet_available() {
        let mut engine = engine(queue_with_seconds(10..=12), 2.0, 0.0);
        let result = engine.resolve(12 * SEC, Phase::Delayed, 5.0);
        assert!(matches!(result, DelayResolution::NoFrameYet { target_us } if target_us == 7 * SEC));
    }

    #[test]
    fn test_empty_queue_not_ready() {
        let queue = Arc::new(FrameQueue::new(FrameQueueConfig {
            capacity: 4,
            retention_us: SEC,
        }));
        let mut engine = engine(queue, 2.0, 0.0);
        assert!(!engine.resolve(SEC, Phase::NoDelay, 0.0).is_ready());
    }

    #[test]
    fn test_delay_longer_than_uptime_saturates() {
        let mut engine = engine(queue_with_seconds(0..=3), 2.0, 0.0);
        let resolved = engine.resolve(3 * SEC, Phase::Delayed, 10.0).ready().unwrap();
        assert_eq!(resolved.target_us, 0);
        assert_eq!(resolved.frame.timestamp_us, 0);
    }
}
