// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Installation phases and the fixed order they run in.
//!
//! ```text
//! ProjectionOff -> BlackAtBeginning -> FadeIn -> NoDelay -> Delayed -> Frozen
//!   -> CameraFadeOut -> OnlyRain -> FadeOut -> BlackAtEnd --restart--> BlackAtBeginning
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::config::PrefParams;

/// One stage of the installation's scripted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Projector window closed.
    ProjectionOff,
    /// Projector open, showing black.
    BlackAtBeginning,
    /// Live camera and rain fade in.
    FadeIn,
    /// Live mirror.
    NoDelay,
    /// Slow mirror: lag grows with time.
    Delayed,
    /// The mirror stops at the moment of freezing.
    Frozen,
    /// Camera layer fades out, rain remains.
    CameraFadeOut,
    /// Only the background rain is visible.
    OnlyRain,
    /// Rain fades to black.
    FadeOut,
    /// Black until restarted.
    BlackAtEnd,
}

impl Default for Phase {
    fn default() -> Self {
        Self::ProjectionOff
    }
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::ProjectionOff,
        Phase::BlackAtBeginning,
        Phase::FadeIn,
        Phase::NoDelay,
        Phase::Delayed,
        Phase::Frozen,
        Phase::CameraFadeOut,
        Phase::OnlyRain,
        Phase::FadeOut,
        Phase::BlackAtEnd,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Successor in the graph. `BlackAtEnd` has none: only restart leaves it.
    pub fn next(self) -> Option<Phase> {
        match self {
            Self::BlackAtEnd => None,
            other => Self::ALL.get(other.index() + 1).copied(),
        }
    }

    /// Predecessor in the graph. `ProjectionOff` has none.
    pub fn previous(self) -> Option<Phase> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Phases that end on their own once their duration has elapsed.
    pub fn auto_timeout(self) -> bool {
        matches!(self, Self::FadeIn | Self::CameraFadeOut | Self::FadeOut)
    }

    /// Duration in seconds for auto-timeout phases, taken from the operator
    /// parameters and clamped to [`Phase::MIN_DURATION_SECS`].
    pub fn duration_secs(self, params: &PrefParams) -> Option<f64> {
        let raw = match self {
            Self::FadeIn => params.fade_in_time,
            Self::CameraFadeOut => params.camera_fade_out_time,
            Self::FadeOut => params.rain_fade_out_time,
            _ => return None,
        };
        Some(if raw.is_nan() {
            Self::MIN_DURATION_SECS
        } else {
            raw.max(Self::MIN_DURATION_SECS)
        })
    }

    pub const MIN_DURATION_SECS: f64 = 0.001;

    /// Phases where the camera layer can be visible.
    pub fn shows_camera(self) -> bool {
        matches!(
            self,
            Self::FadeIn | Self::NoDelay | Self::Delayed | Self::Frozen | Self::CameraFadeOut
        )
    }

    /// Phases during which the mirror lags behind real time.
    pub fn is_delayed(self) -> bool {
        matches!(
            self,
            Self::Delayed | Self::Frozen | Self::CameraFadeOut | Self::OnlyRain | Self::FadeOut
        )
    }

    /// Short text for the GUI's step indicator.
    pub fn label(self) -> &'static str {
        match self {
            Self::ProjectionOff => "Projection off",
            Self::BlackAtBeginning => "Black",
            Self::FadeIn => "Fade in",
            Self::NoDelay => "No delay",
            Self::Delayed => "Delayed",
            Self::Frozen => "Frozen",
            Self::CameraFadeOut => "Camera fade out",
            Self::OnlyRain => "Only rain",
            Self::FadeOut => "Fade out",
            Self::BlackAtEnd => "Black at end",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Externally triggered transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseCommand {
    Next,
    Back,
    Restart,
}

impl std::fmt::Display for PhaseCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next => write!(f, "next"),
            Self::Back => write!(f, "back"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

bitflags! {
    /// Which GUI controls are currently usable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonState: u8 {
        const NEXT = 0b0001;
        const BACK = 0b0010;
        const RESTART = 0b0100;
        /// Camera on/off toggle.
        const CAMERA = 0b1000;
    }
}

impl ButtonState {
    /// Enabled controls for `phase`. Leaving `ProjectionOff` needs a running
    /// camera; the camera toggle is locked while the camera is on screen.
    pub fn for_phase(phase: Phase, camera_enabled: bool) -> Self {
        let mut state = ButtonState::RESTART;
        if phase.next().is_some() && (phase != Phase::ProjectionOff || camera_enabled) {
            state |= ButtonState::NEXT;
        }
        if phase.previous().is_some() {
            state |= ButtonState::BACK;
        }
        if !phase.shows_camera() {
            state |= ButtonState::CAMERA;
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_is_linear_and_ordered() {
        for pair in Phase::ALL.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].previous(), Some(pair[0]));
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(Phase::BlackAtEnd.next(), None);
        assert_eq!(Phase::ProjectionOff.previous(), None);
    }

    #[test]
    fn test_auto_timeout_phases_have_durations() {
        let params = PrefParams::default();
        for phase in Phase::ALL {
            assert_eq!(phase.auto_timeout(), phase.duration_secs(&params).is_some());
        }
        assert_eq!(Phase::FadeIn.duration_secs(&params), Some(params.fade_in_time));
        assert_eq!(
            Phase::CameraFadeOut.duration_secs(&params),
            Some(params.camera_fade_out_time)
        );
        assert_eq!(Phase::FadeOut.duration_secs(&params), Some(params.rain_fade_out_time));
    }

    #[test]
    fn test_zero_duration_is_clamped() {
        let params = PrefParams {
            fade_in_time: 0.0,
            rain_fade_out_time: -4.0,
            ..PrefParams::default()
        };
        assert_eq!(Phase::FadeIn.duration_secs(&params), Some(Phase::MIN_DURATION_SECS));
        assert_eq!(Phase::FadeOut.duration_secs(&params), Some(Phase::MIN_DURATION_SECS));
    }

    #[test]
    fn test_button_state() {
        let off = ButtonState::for_phase(Phase::ProjectionOff, false);
        assert_eq!(off, ButtonState::RESTART | ButtonState::CAMERA);

        let off_with_camera = ButtonState::for_phase(Phase::ProjectionOff, true);
        assert!(off_with_camera.contains(ButtonState::NEXT));

        let delayed = ButtonState::for_phase(Phase::Delayed, true);
        assert_eq!(
            delayed,
            ButtonState::NEXT | ButtonState::BACK | ButtonState::RESTART
        );

        let end = ButtonState::for_phase(Phase::BlackAtEnd, true);
        assert!(!end.contains(ButtonState::NEXT));
        assert!(end.contains(ButtonState::BACK | ButtonState::RESTART | ButtonState::CAMERA));
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::CameraFadeOut.to_string(), "CameraFadeOut");
        assert_eq!(PhaseCommand::Restart.to_string(), "restart");
    }
}
