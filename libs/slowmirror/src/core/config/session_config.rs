// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// How the mirror's lag is derived while a delayed phase is running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayMode {
    /// `delay = delay_ratio * seconds since the Delayed phase began`, so the
    /// image plays back at `1 - delay_ratio` speed (the slow mirror).
    Proportional,
    /// Constant lag in seconds, independent of `delay_ratio`.
    Fixed { seconds: f64 },
}

impl Default for DelayMode {
    fn default() -> Self {
        Self::Proportional
    }
}

/// Engine tuning that is fixed for a session (not exposed in the panel).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Render tick rate in Hz.
    pub tick_rate_hz: f64,
    /// Camera frame rate the frame queue is sized for.
    pub expected_frame_rate: f64,
    /// Longest lag the mirror may reach; delays are clamped to this.
    pub max_delay_secs: f64,
    /// Extra history retained beyond `max_delay_secs`.
    pub retention_headroom_secs: f64,
    /// Extra queue slots on top of `max_delay * frame_rate`.
    pub guard_band_frames: usize,
    /// Age a frame must reach before deterioration begins.
    pub deterioration_start_secs: f64,
    pub delay_mode: DelayMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            expected_frame_rate: 30.0,
            max_delay_secs: 120.0,
            retention_headroom_secs: 2.0,
            guard_band_frames: 16,
            deterioration_start_secs: 0.0,
            delay_mode: DelayMode::Proportional,
        }
    }
}

impl SessionConfig {
    const MIN_TICK_RATE_HZ: f64 = 1.0;
    const MAX_TICK_RATE_HZ: f64 = 240.0;
    const MIN_FRAME_RATE: f64 = 1.0;
    const MAX_FRAME_RATE: f64 = 240.0;
    /// Longest history a session may be configured to hold.
    pub const MAX_DELAY_LIMIT_SECS: f64 = 600.0;

    /// Copy with out-of-range values replaced by the nearest safe value.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let positive_or = |v: f64, fallback: f64| if v.is_finite() && v >= 0.0 { v } else { fallback };

        let tick_rate_hz = if self.tick_rate_hz.is_finite() {
            self.tick_rate_hz
                .max(Self::MIN_TICK_RATE_HZ)
                .min(Self::MAX_TICK_RATE_HZ)
        } else {
            defaults.tick_rate_hz
        };
        let expected_frame_rate = if self.expected_frame_rate.is_finite() {
            self.expected_frame_rate
                .max(Self::MIN_FRAME_RATE)
                .min(Self::MAX_FRAME_RATE)
        } else {
            defaults.expected_frame_rate
        };
        let delay_mode = match self.delay_mode {
            DelayMode::Fixed { seconds } => DelayMode::Fixed {
                seconds: positive_or(seconds, 0.0),
            },
            DelayMode::Proportional => DelayMode::Proportional,
        };

        Self {
            tick_rate_hz,
            expected_frame_rate,
            max_delay_secs: positive_or(self.max_delay_secs, defaults.max_delay_secs)
                .min(Self::MAX_DELAY_LIMIT_SECS),
            retention_headroom_secs: positive_or(
                self.retention_headroom_secs,
                defaults.retention_headroom_secs,
            )
            .min(Self::MAX_DELAY_LIMIT_SECS),
            guard_band_frames: self.guard_band_frames,
            deterioration_start_secs: positive_or(self.deterioration_start_secs, 0.0),
            delay_mode,
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.sanitized().tick_rate_hz)
    }
}
