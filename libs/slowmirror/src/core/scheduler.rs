// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The render loop.
//!
//! One tick: apply pending commands, let the state machine time out, resolve
//! the delayed frame, compute visual parameters and hand the lot to the
//! compositor. A tick with no resolvable frame submits nothing.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::RwLock;

use crate::core::clocks::Clock;
use crate::core::compositor::Compositor;
use crate::core::config::{PrefParams, PrefTag, PreferenceSource, SessionConfig};
use crate::core::delay_engine::{DelayEngine, DelayResolution};
use crate::core::error::ErrorReporter;
use crate::core::events::{EventBroadcaster, MirrorEvent};
use crate::core::frame_queue::FrameQueue;
use crate::core::phase::{ButtonState, Phase, PhaseCommand};
use crate::core::state_machine::{StateMachine, Transition};
use crate::core::visual::VisualParameters;
use crate::core::{MirrorError, Result};

/// Requests queued by collaborators and applied at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Phase(PhaseCommand),
    PreferenceChanged(PrefTag),
    CameraEnabled(bool),
}

/// Snapshot of the session published after every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorStatus {
    pub phase: Phase,
    pub progress: f64,
    pub buttons: ButtonState,
    pub camera_enabled: bool,
    pub delay_secs: f64,
    pub last_tick_us: u64,
}

impl MirrorStatus {
    pub fn initial(camera_enabled: bool) -> Self {
        Self {
            phase: Phase::ProjectionOff,
            progress: 0.0,
            buttons: ButtonState::for_phase(Phase::ProjectionOff, camera_enabled),
            camera_enabled,
            delay_secs: 0.0,
            last_tick_us: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Rendered {
        sequence: u64,
        timestamp_us: u64,
        weight: f64,
        params: VisualParameters,
    },
    /// No frame covered the target time.
    Skipped,
}

/// Everything the scheduler needs, handed over at construction.
pub struct SchedulerParts {
    pub clock: Arc<dyn Clock>,
    pub queue: Arc<FrameQueue>,
    pub preferences: Arc<dyn PreferenceSource>,
    pub session: SessionConfig,
    pub compositor: Box<dyn Compositor>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub events: Arc<EventBroadcaster>,
    pub commands: Receiver<SchedulerCommand>,
    pub status: Arc<RwLock<MirrorStatus>>,
    pub camera_enabled: bool,
}

pub struct RenderScheduler {
    clock: Arc<dyn Clock>,
    state: StateMachine,
    delay: DelayEngine,
    preferences: Arc<dyn PreferenceSource>,
    params: PrefParams,
    session: SessionConfig,
    compositor: Box<dyn Compositor>,
    reporter: Arc<dyn ErrorReporter>,
    events: Arc<EventBroadcaster>,
    commands: Receiver<SchedulerCommand>,
    status: Arc<RwLock<MirrorStatus>>,
    camera_enabled: bool,
}

impl RenderScheduler {
    pub fn new(parts: SchedulerParts) -> Self {
        let session = parts.session.sanitized();
        let params = parts.preferences.snapshot().sanitized();
        let now_us = parts.clock.now_us();
        let delay = DelayEngine::new(parts.queue, &params, &session);

        *parts.status.write() = MirrorStatus {
            last_tick_us: now_us,
            ..MirrorStatus::initial(parts.camera_enabled)
        };

        Self {
            clock: parts.clock,
            state: StateMachine::new(now_us),
            delay,
            preferences: parts.preferences,
            params,
            session,
            compositor: parts.compositor,
            reporter: parts.reporter,
            events: parts.events,
            commands: parts.commands,
            status: parts.status,
            camera_enabled: parts.camera_enabled,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.state
    }

    pub fn preferences(&self) -> &PrefParams {
        &self.params
    }

    /// Run one tick at the clock's current time.
    pub fn tick(&mut self) -> TickOutcome {
        let now_us = self.clock.now_us();
        self.tick_at(now_us)
    }

    /// Run one tick as if the time were `now_us`.
    pub fn tick_at(&mut self, now_us: u64) -> TickOutcome {
        self.drain_commands(now_us);

        if let Some(transition) = self.state.advance(now_us, &self.params) {
            self.on_transition(transition);
        }

        let phase = self.state.phase();
        let progress = self.state.progress(now_us, &self.params);
        let delay_secs = self.state.delay_secs(now_us, &self.params, &self.session);

        self.publish_status(now_us, progress, delay_secs);

        let resolved = match self.delay.resolve(now_us, phase, delay_secs) {
            DelayResolution::Ready(resolved) => resolved,
            DelayResolution::NoFrameYet { .. } => {
                self.events.publish(MirrorEvent::TickSkipped {
                    phase,
                    at_us: now_us,
                });
                return TickOutcome::Skipped;
            }
        };

        let params = VisualParameters::compute(phase, progress, &self.params);
        let sequence = resolved.frame.sequence;
        let timestamp_us = resolved.frame.timestamp_us;
        let weight = resolved.deterioration_weight;

        self.compositor
            .submit_for_display(resolved.frame, weight, &params);

        self.events.publish(MirrorEvent::FrameDisplayed {
            sequence,
            timestamp_us,
            weight,
            phase,
        });

        TickOutcome::Rendered {
            sequence,
            timestamp_us,
            weight,
            params,
        }
    }

    fn drain_commands(&mut self, now_us: u64) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SchedulerCommand::Phase(command) => self.apply_phase_command(command, now_us),
                SchedulerCommand::PreferenceChanged(tag) => self.refresh_preferences(tag),
                SchedulerCommand::CameraEnabled(enabled) => self.set_camera_enabled(enabled),
            }
        }
    }

    fn apply_phase_command(&mut self, command: PhaseCommand, now_us: u64) {
        match self.state.apply(command, now_us) {
            Ok(transition) => self.on_transition(transition),
            Err(err) => {
                self.reporter.report(&err);
                if let MirrorError::InvalidTransition { phase, command } = err {
                    self.events
                        .publish(MirrorEvent::TransitionRejected { phase, command });
                }
            }
        }
    }

    fn refresh_preferences(&mut self, tag: PrefTag) {
        self.params = self.preferences.snapshot().sanitized();
        self.delay.update_preferences(&self.params);
        tracing::debug!("Preference {} changed to {}", tag, self.params.get(tag));
        self.events.publish(MirrorEvent::PreferenceChanged { tag });
    }

    fn set_camera_enabled(&mut self, enabled: bool) {
        if self.camera_enabled == enabled {
            return;
        }
        self.camera_enabled = enabled;
        tracing::info!("Camera {}", if enabled { "enabled" } else { "disabled" });
        self.events.publish(MirrorEvent::CameraToggled { enabled });
    }

    fn on_transition(&mut self, transition: Transition) {
        if transition.from == Phase::Frozen || transition.to == Phase::BlackAtBeginning {
            self.delay.reset();
        }
        let buttons = ButtonState::for_phase(transition.to, self.camera_enabled);
        self.events
            .publish(MirrorEvent::phase_changed(&transition, buttons));
    }

    fn publish_status(&self, now_us: u64, progress: f64, delay_secs: f64) {
        let phase = self.state.phase();
        *self.status.write() = MirrorStatus {
            phase,
            progress,
            buttons: ButtonState::for_phase(phase, self.camera_enabled),
            camera_enabled: self.camera_enabled,
            delay_secs,
            last_tick_us: now_us,
        };
    }

    /// Move the scheduler onto its own thread, ticking every `interval` until
    /// the returned handle is stopped.
    pub fn spawn(mut self, interval: Duration) -> Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = std::thread::Builder::new()
            .name("slowmirror-render".to_string())
            .spawn(move || {
                tracing::info!("Render loop started ({:?} per tick)", interval);
                let ticker = tick(interval);
                loop {
                    match self.step(&ticker, &stop_rx) {
                        LoopControl::Continue => continue,
                        LoopControl::Break => break,
                    }
                }
                tracing::info!("Render loop stopped in phase {}", self.state.phase());
                self
            })?;

        Ok(SchedulerHandle {
            stop: stop_tx,
            thread: Some(thread),
        })
    }

    fn step(&mut self, ticker: &Receiver<std::time::Instant>, stop: &Receiver<()>) -> LoopControl {
        select! {
            recv(stop) -> _ => LoopControl::Break,
            recv(ticker) -> _ => {
                self.tick();
                LoopControl::Continue
            }
        }
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("clock", &self.clock.description())
            .field("state", &self.state)
            .field("delay", &self.delay)
            .field("camera_enabled", &self.camera_enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Break,
}

/// Owner of a running render thread.
pub struct SchedulerHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<RenderScheduler>>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop ticking and get the scheduler back so it can be resumed later.
    pub fn stop(mut self) -> Result<RenderScheduler> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<RenderScheduler> {
        let _ = self.stop.try_send(());
        let thread = self
            .thread
            .take()
            .ok_or_else(|| MirrorError::SchedulerStopped("already joined".to_string()))?;
        thread
            .join()
            .map_err(|_| MirrorError::SchedulerStopped("render thread panicked".to_string()))
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(err) = self.stop_and_join() {
                tracing::error!("{}", err);
            }
        }
    }
}
