// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Time-indexed ring of captured frames for the delayed mirror.
//!
//! Key properties:
//! - Bounded: capacity and retention age are fixed at construction
//! - Drop-oldest: the producer is never blocked or refused for lack of room
//! - Strictly time-ordered: out-of-order timestamps are rejected
//! - Lookup by time is a binary search under the lock
//! - Frames are shared as `Arc`, so lookups copy out a reference only
//!
//! One writer (capture callback) and one reader (render loop) share the queue
//! through a single `parking_lot::Mutex` held only for append+evict or
//! search+clone.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::SessionConfig;
use crate::core::frames::CapturedFrame;
use crate::core::timing::secs_to_us;
use crate::core::{MirrorError, Result};

/// Whether any frame has arrived since creation (or the last clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameQueueState {
    Empty,
    Ready,
}

/// Sizing for a [`FrameQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameQueueConfig {
    /// Maximum number of frames held.
    pub capacity: usize,
    /// Frames older than `newest - retention_us` are evicted.
    pub retention_us: u64,
}

impl FrameQueueConfig {
    /// `capacity = ceil(max_delay * frame_rate) + guard_band`,
    /// `retention = max_delay + headroom`.
    pub fn for_session(config: &SessionConfig) -> Self {
        let config = config.sanitized();
        let frames = (config.max_delay_secs * config.expected_frame_rate).ceil();
        let frames = if frames.is_finite() && frames > 0.0 {
            frames as usize
        } else {
            0
        };
        Self {
            capacity: frames.saturating_add(config.guard_band_frames).max(1),
            retention_us: secs_to_us(config.max_delay_secs + config.retention_headroom_secs),
        }
    }
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameQueueStats {
    pub enqueued: u64,
    pub rejected: u64,
    pub evicted: u64,
}

/// Slots reserved up front; larger queues grow on demand.
const INITIAL_SLOTS: usize = 4_096;

struct QueueState {
    frames: VecDeque<Arc<CapturedFrame>>,
    last_timestamp_us: Option<u64>,
    state: FrameQueueState,
    stats: FrameQueueStats,
}

pub struct FrameQueue {
    config: FrameQueueConfig,
    inner: Mutex<QueueState>,
}

impl FrameQueue {
    /// # Panics
    ///
    /// Panics if `config.capacity` is 0.
    pub fn new(config: FrameQueueConfig) -> Self {
        assert!(
            config.capacity >= 1,
            "Frame queue must hold at least 1 frame, got {}",
            config.capacity
        );

        Self {
            config,
            inner: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(config.capacity.min(INITIAL_SLOTS)),
                last_timestamp_us: None,
                state: FrameQueueState::Empty,
                stats: FrameQueueStats::default(),
            }),
        }
    }

    pub fn for_session(config: &SessionConfig) -> Self {
        Self::new(FrameQueueConfig::for_session(config))
    }

    /// Append a frame. Its timestamp must be strictly greater than the last
    /// accepted one; otherwise the frame is dropped, a warning is logged and
    /// `OutOfOrderFrame` is returned. Never blocks on capacity: the oldest
    /// frames are evicted instead.
    pub fn enqueue(&self, frame: CapturedFrame) -> Result<()> {
        let mut inner = self.inner.lock();

        if let Some(last) = inner
            .last_timestamp_us
            .filter(|&last| frame.timestamp_us <= last)
        {
            inner.stats.rejected += 1;
            drop(inner);
            tracing::warn!(
                "Dropping frame #{} at {}us: not after last enqueued {}us",
                frame.sequence,
                frame.timestamp_us,
                last
            );
            return Err(MirrorError::OutOfOrderFrame {
                timestamp_us: frame.timestamp_us,
                last_timestamp_us: last,
            });
        }

        let newest = frame.timestamp_us;
        inner.last_timestamp_us = Some(newest);
        inner.frames.push_back(Arc::new(frame));
        inner.stats.enqueued += 1;

        let mut evicted = 0u64;
        while inner.frames.len() > self.config.capacity {
            inner.frames.pop_front();
            evicted += 1;
        }
        let horizon = newest.saturating_sub(self.config.retention_us);
        while inner.frames.len() > 1
            && inner
                .frames
                .front()
                .is_some_and(|oldest| oldest.timestamp_us < horizon)
        {
            inner.frames.pop_front();
            evicted += 1;
        }
        inner.stats.evicted += evicted;

        if inner.state == FrameQueueState::Empty {
            inner.state = FrameQueueState::Ready;
            drop(inner);
            tracing::debug!("Frame queue ready (first frame at {}us)", newest);
        }

        Ok(())
    }

    /// Newest frame with `timestamp <= target_us`, or `None` if the queue is
    /// empty or `target_us` predates the oldest retained frame.
    pub fn lookup(&self, target_us: u64) -> Option<Arc<CapturedFrame>> {
        let inner = self.inner.lock();
        let after = inner
            .frames
            .partition_point(|frame| frame.timestamp_us <= target_us);
        after
            .checked_sub(1)
            .and_then(|idx| inner.frames.get(idx))
            .cloned()
    }

    /// Most recently enqueued frame.
    pub fn latest(&self) -> Option<Arc<CapturedFrame>> {
        self.inner.lock().frames.back().cloned()
    }

    /// Timestamp of the oldest retained frame (the retention horizon).
    pub fn oldest_timestamp_us(&self) -> Option<u64> {
        self.inner.lock().frames.front().map(|f| f.timestamp_us)
    }

    pub fn newest_timestamp_us(&self) -> Option<u64> {
        self.inner.lock().frames.back().map(|f| f.timestamp_us)
    }

    pub fn state(&self) -> FrameQueueState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == FrameQueueState::Ready
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> FrameQueueConfig {
        self.config
    }

    pub fn stats(&self) -> FrameQueueStats {
        self.inner.lock().stats
    }

    /// Drop every frame and return to `Empty`. The ordering guard is reset
    /// too, so a restarted camera may begin again from any timestamp.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.frames.clear();
        inner.last_timestamp_us = None;
        inner.state = FrameQueueState::Empty;
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FrameQueue")
            .field("config", &self.config)
            .field("len", &inner.frames.len())
            .field("state", &inner.state)
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{PixelBuffer, PixelFormat};

    fn frame(timestamp_us: u64, sequence: u64) -> CapturedFrame {
        CapturedFrame::new(
            timestamp_us,
            sequence,
            PixelBuffer::blank(2, 2, PixelFormat::Gray8),
        )
    }

    fn queue(capacity: usize) -> FrameQueue {
        FrameQueue::new(FrameQueueConfig {
            capacity,
            retention_us: u64::MAX,
        })
    }

    #[test]
    fn test_new_queue_is_empty() {
        let q = queue(4);
        assert_eq!(q.state(), FrameQueueState::Empty);
        assert!(q.is_empty());
        assert!(q.lookup(1_000).is_none());
        assert!(q.latest().is_none());
    }

    #[test]
    #[should_panic(expected = "Frame queue must hold at least 1 frame")]
    fn test_zero_capacity_panics() {
        let _q = queue(0);
    }

    #[test]
    fn test_first_enqueue_makes_ready() {
        let q = queue(4);
        q.enqueue(frame(10, 0)).unwrap();
        assert_eq!(q.state(), FrameQueueState::Ready);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_lookup_returns_newest_at_or_before() {
        let q = queue(16);
        for (i, ts) in [100u64, 200, 300, 400].iter().enumerate() {
            q.enqueue(frame(*ts, i as u64)).unwrap();
        }

        assert_eq!(q.lookup(100).unwrap().timestamp_us, 100);
        assert_eq!(q.lookup(250).unwrap().timestamp_us, 200);
        assert_eq!(q.lookup(300).unwrap().timestamp_us, 300);
        assert_eq!(q.lookup(10_000).unwrap().timestamp_us, 400);
        assert!(q.lookup(99).is_none(), "before retention horizon");
    }

    #[test]
    fn test_out_of_order_and_duplicate_rejected() {
        let q = queue(8);
        q.enqueue(frame(500, 0)).unwrap();

        let dup = q.enqueue(frame(500, 1)).unwrap_err();
        assert!(matches!(
            dup,
            MirrorError::OutOfOrderFrame {
                timestamp_us: 500,
                last_timestamp_us: 500
            }
        ));
        assert!(q.enqueue(frame(400, 2)).is_err());

        assert_eq!(q.len(), 1);
        assert_eq!(q.stats().rejected, 2);
        q.enqueue(frame(501, 3)).unwrap();
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let q = queue(100);
        for i in 0..150u64 {
            q.enqueue(frame((i + 1) * 1_000, i)).unwrap();
            assert!(q.len() <= 100);
        }

        assert_eq!(q.len(), 100);
        assert_eq!(q.stats().evicted, 50);
        assert_eq!(q.oldest_timestamp_us(), Some(51_000));
        assert_eq!(q.newest_timestamp_us(), Some(150_000));
        assert!(q.lookup(50_999).is_none());
        assert_eq!(q.lookup(51_000).unwrap().sequence, 50);
    }

    #[test]
    fn test_retention_age_evicts_but_keeps_newest() {
        let q = FrameQueue::new(FrameQueueConfig {
            capacity: 1_000,
            retention_us: 5_000,
        });
        for ts in [1_000u64, 2_000, 3_000, 9_000] {
            q.enqueue(frame(ts, ts)).unwrap();
        }
        // horizon = 9_000 - 5_000 = 4_000
        assert_eq!(q.oldest_timestamp_us(), Some(9_000));
        assert_eq!(q.len(), 1);

        q.enqueue(frame(100_000, 1)).unwrap();
        assert_eq!(q.len(), 1, "a single newest frame always survives");
        assert_eq!(q.latest().unwrap().timestamp_us, 100_000);
    }

    #[test]
    fn test_clear_resets_state_and_ordering() {
        let q = queue(4);
        q.enqueue(frame(1_000, 0)).unwrap();
        q.clear();
        assert_eq!(q.state(), FrameQueueState::Empty);
        assert!(q.lookup(1_000).is_none());

        q.enqueue(frame(10, 1)).unwrap();
        assert!(q.is_ready());
    }

    #[test]
    fn test_config_for_session() {
        let session = SessionConfig {
            max_delay_secs: 10.0,
            expected_frame_rate: 30.0,
            guard_band_frames: 5,
            retention_headroom_secs: 1.0,
            ..SessionConfig::default()
        };
        let config = FrameQueueConfig::for_session(&session);
        assert_eq!(config.capacity, 305);
        assert_eq!(config.retention_us, 11_000_000);
    }

    #[test]
    fn test_config_for_session_with_absurd_values() {
        let session = SessionConfig {
            max_delay_secs: 1e18,
            expected_frame_rate: 1e9,
            guard_band_frames: usize::MAX,
            ..SessionConfig::default()
        };
        let config = FrameQueueConfig::for_session(&session);
        assert_eq!(config.capacity, usize::MAX);

        let sane = FrameQueueConfig::for_session(&SessionConfig {
            max_delay_secs: 1e18,
            ..SessionConfig::default()
        });
        // 600s at 30fps plus the default guard band.
        assert_eq!(sane.capacity, 18_000 + 16);

        let q = FrameQueue::new(config);
        q.enqueue(frame(1, 0)).unwrap();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_lookup_property_against_linear_scan() {
        let q = queue(64);
        let mut stamps = Vec::new();
        let mut ts = 0u64;
        for i in 0..200u64 {
            ts += 1 + (i * 7919) % 13;
            stamps.push(ts);
            q.enqueue(frame(ts, i)).unwrap();
        }
        let retained = &stamps[stamps.len() - 64..];
        for target in 0..=ts + 5 {
            let expected = retained.iter().rev().find(|&&s| s <= target).copied();
            assert_eq!(q.lookup(target).map(|f| f.timestamp_us), expected, "target {target}");
        }
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let q = Arc::new(queue(32));
        let writer_q = Arc::clone(&q);

        let writer = thread::spawn(move || {
            for i in 0..1_000u64 {
                writer_q.enqueue(frame(i + 1, i)).unwrap();
            }
        });

        let reader = thread::spawn(move || {
            for i in 0..1_000u64 {
                if let Some(found) = q.lookup(i) {
                    assert!(found.timestamp_us <= i);
                }
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
