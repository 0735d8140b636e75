// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Operator-tunable parameters (the preference panel's sliders).
//!
//! The preference collaborator owns these values. The core only reads
//! snapshots through [`PreferenceSource`] and is told which field moved via
//! `MirrorSession::on_preference_changed`.

use std::ops::RangeInclusive;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifies one [`PrefParams`] field, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefTag {
    ProjectionWidth,
    DelayRatio,
    DeteriorationTime,
    BrightnessWindowLow,
    BrightnessWindowHigh,
    BloomRadius,
    MaxContrast,
    FadeInTime,
    CameraFadeOutTime,
    RainFadeOutTime,
    FadingGamma,
}

impl PrefTag {
    pub const ALL: [PrefTag; 11] = [
        PrefTag::ProjectionWidth,
        PrefTag::DelayRatio,
        PrefTag::DeteriorationTime,
        PrefTag::BrightnessWindowLow,
        PrefTag::BrightnessWindowHigh,
        PrefTag::BloomRadius,
        PrefTag::MaxContrast,
        PrefTag::FadeInTime,
        PrefTag::CameraFadeOutTime,
        PrefTag::RainFadeOutTime,
        PrefTag::FadingGamma,
    ];

    /// Valid range for the field; values outside it are clamped at use.
    pub fn range(self) -> RangeInclusive<f64> {
        match self {
            Self::ProjectionWidth => 0.1..=1.0,
            Self::DelayRatio => 0.0..=0.95,
            Self::DeteriorationTime => 0.1..=600.0,
            Self::BrightnessWindowLow | Self::BrightnessWindowHigh => 0.0..=1.0,
            Self::BloomRadius => 0.0..=100.0,
            Self::MaxContrast => 1.0..=10.0,
            Self::FadeInTime | Self::CameraFadeOutTime | Self::RainFadeOutTime => 0.001..=600.0,
            Self::FadingGamma => 0.1..=10.0,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::ProjectionWidth => "projection_width",
            Self::DelayRatio => "delay_ratio",
            Self::DeteriorationTime => "deterioration_time",
            Self::BrightnessWindowLow => "brightness_window_low",
            Self::BrightnessWindowHigh => "brightness_window_high",
            Self::BloomRadius => "bloom_radius",
            Self::MaxContrast => "max_contrast",
            Self::FadeInTime => "fade_in_time",
            Self::CameraFadeOutTime => "camera_fade_out_time",
            Self::RainFadeOutTime => "rain_fade_out_time",
            Self::FadingGamma => "fading_gamma",
        }
    }

    /// Inverse of [`PrefTag::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.key() == key)
    }
}

impl std::fmt::Display for PrefTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Snapshot of the operator parameters. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefParams {
    /// Fraction of the projector width used for the image.
    pub projection_width: f64,
    /// Fraction of elapsed delayed-phase time by which the mirror lags.
    pub delay_ratio: f64,
    /// Seconds over which an aged frame goes from intact to fully deteriorated.
    pub deterioration_time: f64,
    pub brightness_window_low: f64,
    pub brightness_window_high: f64,
    pub bloom_radius: f64,
    pub max_contrast: f64,
    pub fade_in_time: f64,
    pub camera_fade_out_time: f64,
    pub rain_fade_out_time: f64,
    /// Exponent of the fade curves (`progress^gamma`).
    pub fading_gamma: f64,
}

impl Default for PrefParams {
    fn default() -> Self {
        Self {
            projection_width: 1.0,
            delay_ratio: 0.5,
            deterioration_time: 20.0,
            brightness_window_low: 0.0,
            brightness_window_high: 1.0,
            bloom_radius: 10.0,
            max_contrast: 2.5,
            fade_in_time: 5.0,
            camera_fade_out_time: 10.0,
            rain_fade_out_time: 10.0,
            fading_gamma: 2.0,
        }
    }
}

impl PrefParams {
    pub fn get(&self, tag: PrefTag) -> f64 {
        match tag {
            PrefTag::ProjectionWidth => self.projection_width,
            PrefTag::DelayRatio => self.delay_ratio,
            PrefTag::DeteriorationTime => self.deterioration_time,
            PrefTag::BrightnessWindowLow => self.brightness_window_low,
            PrefTag::BrightnessWindowHigh => self.brightness_window_high,
            PrefTag::BloomRadius => self.bloom_radius,
            PrefTag::MaxContrast => self.max_contrast,
            PrefTag::FadeInTime => self.fade_in_time,
            PrefTag::CameraFadeOutTime => self.camera_fade_out_time,
            PrefTag::RainFadeOutTime => self.rain_fade_out_time,
            PrefTag::FadingGamma => self.fading_gamma,
        }
    }

    /// Store `value` as given; range checks happen in [`Self::sanitized`].
    pub fn set(&mut self, tag: PrefTag, value: f64) {
        let slot = match tag {
            PrefTag::ProjectionWidth => &mut self.projection_width,
            PrefTag::DelayRatio => &mut self.delay_ratio,
            PrefTag::DeteriorationTime => &mut self.deterioration_time,
            PrefTag::BrightnessWindowLow => &mut self.brightness_window_low,
            PrefTag::BrightnessWindowHigh => &mut self.brightness_window_high,
            PrefTag::BloomRadius => &mut self.bloom_radius,
            PrefTag::MaxContrast => &mut self.max_contrast,
            PrefTag::FadeInTime => &mut self.fade_in_time,
            PrefTag::CameraFadeOutTime => &mut self.camera_fade_out_time,
            PrefTag::RainFadeOutTime => &mut self.rain_fade_out_time,
            PrefTag::FadingGamma => &mut self.fading_gamma,
        };
        *slot = value;
    }

    /// Copy with every field clamped into its valid range. NaN falls back to
    /// the default value, and an inverted brightness window is collapsed onto
    /// its lower edge.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut out = *self;
        for tag in PrefTag::ALL {
            let range = tag.range();
            let value = self.get(tag);
            let clamped = if value.is_nan() {
                defaults.get(tag)
            } else {
                value.max(*range.start()).min(*range.end())
            };
            out.set(tag, clamped);
        }
        if out.brightness_window_high < out.brightness_window_low {
            out.brightness_window_high = out.brightness_window_low;
        }
        out
    }

    pub fn brightness_window(&self) -> (f64, f64) {
        (self.brightness_window_low, self.brightness_window_high)
    }
}

/// Read side of the preference collaborator.
pub trait PreferenceSource: Send + Sync {
    fn snapshot(&self) -> PrefParams;
}

impl PreferenceSource for PrefParams {
    fn snapshot(&self) -> PrefParams {
        *self
    }
}

/// Thread-safe preference store shared between a GUI and the session.
///
/// The GUI writes through [`SharedPreferences::set`] and then notifies the
/// session with the tag; the render thread picks up a fresh snapshot on its
/// next tick.
#[derive(Debug, Clone, Default)]
pub struct SharedPreferences {
    inner: Arc<RwLock<PrefParams>>,
}

impl SharedPreferences {
    pub fn new(params: PrefParams) -> Self {
        Self {
            inner: Arc::new(RwLock::new(params)),
        }
    }

    pub fn set(&self, tag: PrefTag, value: f64) {
        self.inner.write().set(tag, value);
    }

    pub fn replace(&self, params: PrefParams) {
        *self.inner.write() = params;
    }

    /// Restore factory defaults.
    pub fn reset_to_defaults(&self) {
        self.replace(PrefParams::default());
    }
}

impl PreferenceSource for SharedPreferences {
    fn snapshot(&self) -> PrefParams {
        *self.inner.read()
    }
}
