// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Phase controller for the installation.
//!
//! Only the phase and its entry time are stored. Progress, delay and visual
//! parameters are recomputed from the clock on every query, so variable tick
//! rates cannot make them drift.

use serde::{Deserialize, Serialize};

use crate::core::config::{DelayMode, PrefParams, SessionConfig};
use crate::core::phase::{Phase, PhaseCommand};
use crate::core::timing::{clamp01, us_to_secs};
use crate::core::visual::VisualParameters;
use crate::core::{MirrorError, Result};

/// A completed phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub at_us: u64,
    /// Caused by a timeout rather than a command.
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    phase: Phase,
    entered_at_us: u64,
    /// When the current run of delayed phases began.
    delayed_since_us: Option<u64>,
}

impl StateMachine {
    /// Start in `ProjectionOff`.
    pub fn new(now_us: u64) -> Self {
        Self::with_phase(Phase::ProjectionOff, now_us)
    }

    /// Rebuild a machine that entered `phase` at `entered_at_us`, e.g. when
    /// replaying a recorded session. A delayed phase is assumed to have begun
    /// its delay at the same instant.
    pub fn with_phase(phase: Phase, entered_at_us: u64) -> Self {
        Self {
            phase,
            entered_at_us,
            delayed_since_us: phase.is_delayed().then_some(entered_at_us),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn entered_at_us(&self) -> u64 {
        self.entered_at_us
    }

    pub fn delayed_since_us(&self) -> Option<u64> {
        self.delayed_since_us
    }

    /// Seconds spent in the current phase.
    pub fn elapsed_secs(&self, now_us: u64) -> f64 {
        us_to_secs(now_us.saturating_sub(self.entered_at_us))
    }

    /// `min(1, elapsed / duration)` for timed phases, 0 for the others.
    pub fn progress(&self, now_us: u64, params: &PrefParams) -> f64 {
        match self.phase.duration_secs(params) {
            Some(duration) => clamp01(self.elapsed_secs(now_us) / duration),
            None => 0.0,
        }
    }

    /// Per-tick timeout check. Moves to the next phase at most once, and only
    /// when a timed phase has reached progress 1.
    pub fn advance(&mut self, now_us: u64, params: &PrefParams) -> Option<Transition> {
        if !self.phase.auto_timeout() || self.progress(now_us, params) < 1.0 {
            return None;
        }
        let next = self.phase.next()?;
        Some(self.enter(next, now_us, true))
    }

    /// Apply an external command. Commands that leave the graph are refused
    /// and the machine stays where it is.
    pub fn apply(&mut self, command: PhaseCommand, now_us: u64) -> Result<Transition> {
        let target = match command {
            PhaseCommand::Next => self.phase.next(),
            PhaseCommand::Back => self.phase.previous(),
            PhaseCommand::Restart => Some(Phase::BlackAtBeginning),
        };
        match target {
            Some(to) => Ok(self.enter(to, now_us, false)),
            None => Err(MirrorError::InvalidTransition {
                phase: self.phase,
                command,
            }),
        }
    }

    pub fn go_next(&mut self, now_us: u64) -> Result<Transition> {
        self.apply(PhaseCommand::Next, now_us)
    }

    pub fn go_back(&mut self, now_us: u64) -> Result<Transition> {
        self.apply(PhaseCommand::Back, now_us)
    }

    pub fn restart(&mut self, now_us: u64) -> Transition {
        self.enter(Phase::BlackAtBeginning, now_us, false)
    }

    /// Current lag of the mirror in seconds, clamped to `[0, max_delay]`.
    pub fn delay_secs(&self, now_us: u64, params: &PrefParams, session: &SessionConfig) -> f64 {
        if !self.phase.is_delayed() {
            return 0.0;
        }
        let session = session.sanitized();
        let raw = match session.delay_mode {
            DelayMode::Proportional => {
                let since = self.delayed_since_us.unwrap_or(self.entered_at_us);
                params.sanitized().delay_ratio * us_to_secs(now_us.saturating_sub(since))
            }
            DelayMode::Fixed { seconds } => seconds,
        };
        raw.max(0.0).min(session.max_delay_secs)
    }

    /// Visual parameters for the current phase at `now_us`.
    pub fn current_parameters(&self, now_us: u64, params: &PrefParams) -> VisualParameters {
        VisualParameters::compute(self.phase, self.progress(now_us, params), params)
    }

    fn enter(&mut self, to: Phase, now_us: u64, automatic: bool) -> Transition {
        let from = self.phase;
        self.delayed_since_us = match (from.is_delayed(), to.is_delayed()) {
            (_, false) => None,
            (false, true) => Some(now_us),
            (true, true) => self.delayed_since_us.or(Some(now_us)),
        };
        self.phase = to;
        self.entered_at_us = now_us;

        if automatic {
            tracing::info!("Phase {} -> {} (timeout)", from, to);
        } else {
            tracing::info!("Phase {} -> {}", from, to);
        }

        Transition {
            from,
            to,
            at_us: now_us,
            automatic,
        }
    }
}
