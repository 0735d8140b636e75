// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-phase visual parameters.
//!
//! Everything here is a pure function of `(phase, progress, PrefParams)`:
//! no accumulators, so any moment of a session can be recomputed exactly.

use serde::{Deserialize, Serialize};

use crate::core::config::PrefParams;
use crate::core::phase::Phase;
use crate::core::timing::clamp01;

/// Parameters handed to the compositor together with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualParameters {
    /// Camera layer opacity in `[0, 1]`. In FadeOut the camera is already
    /// gone and the fade applies to `rain_opacity`.
    pub opacity: f64,
    /// Background rain layer opacity in `[0, 1]`.
    pub rain_opacity: f64,
    /// `(low, high)` brightness cut, both in `[0, 1]`.
    pub brightness_window: (f64, f64),
    pub contrast: f64,
    /// Exponent used for the fade curves.
    pub gamma: f64,
    pub bloom_radius: f64,
    pub projection_width: f64,
}

impl VisualParameters {
    /// Parameters for `phase` at `progress` (clamped to `[0, 1]`).
    pub fn compute(phase: Phase, progress: f64, params: &PrefParams) -> Self {
        let params = params.sanitized();
        let progress = clamp01(progress);
        let gamma = params.fading_gamma;

        let rising = progress.powf(gamma);
        let falling = 1.0 - rising;

        let (opacity, rain_opacity) = match phase {
            Phase::ProjectionOff | Phase::BlackAtBeginning => (0.0, 0.0),
            Phase::FadeIn => (rising, rising),
            Phase::NoDelay | Phase::Delayed | Phase::Frozen => (1.0, 1.0),
            Phase::CameraFadeOut => (falling, 1.0),
            Phase::OnlyRain => (0.0, 1.0),
            Phase::FadeOut => (0.0, falling),
            Phase::BlackAtEnd => (0.0, 0.0),
        };

        Self {
            opacity: clamp01(opacity),
            rain_opacity: clamp01(rain_opacity),
            brightness_window: params.brightness_window(),
            contrast: params.max_contrast,
            gamma,
            bloom_radius: params.bloom_radius,
            projection_width: params.projection_width,
        }
    }

    /// Nothing is drawn at all (both layers transparent).
    pub fn is_black(&self) -> bool {
        self.opacity == 0.0 && self.rain_opacity == 0.0
    }
}
