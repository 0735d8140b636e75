// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Entry point for the installation's collaborators.
//!
//! ```ignore
//! let session = MirrorSession::builder()
//!     .config(MirrorConfig::load_or_default(&path))
//!     .compositor(my_compositor)
//!     .build()?;
//! session.start()?;
//! camera.on_frame(|pixels, ts| session.on_frame_captured(pixels, ts));
//! session.request_next();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::core::clocks::{Clock, SoftwareClock};
use crate::core::compositor::Compositor;
use crate::core::config::{MirrorConfig, PrefTag, PreferenceSource};
use crate::core::error::{ErrorReporter, TracingErrorReporter};
use crate::core::events::{EventBroadcaster, MirrorEvent, DEFAULT_EVENT_CAPACITY};
use crate::core::frame_queue::FrameQueue;
use crate::core::frames::{CapturedFrame, PixelBuffer};
use crate::core::phase::{ButtonState, Phase, PhaseCommand};
use crate::core::scheduler::{
    MirrorStatus, RenderScheduler, SchedulerCommand, SchedulerHandle, SchedulerParts, TickOutcome,
};
use crate::core::visual::VisualParameters;
use crate::core::{MirrorError, Result};

enum SchedulerSlot {
    Idle(Box<RenderScheduler>),
    Running(SchedulerHandle),
    /// The render thread panicked and took the scheduler with it.
    Lost,
}

pub struct MirrorSession {
    config: MirrorConfig,
    clock: Arc<dyn Clock>,
    queue: Arc<FrameQueue>,
    events: Arc<EventBroadcaster>,
    commands: Sender<SchedulerCommand>,
    status: Arc<RwLock<MirrorStatus>>,
    camera_enabled: AtomicBool,
    next_sequence: AtomicU64,
    scheduler: Mutex<SchedulerSlot>,
}

impl MirrorSession {
    pub fn builder() -> MirrorSessionBuilder {
        MirrorSessionBuilder::new()
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Spawn the render thread, ticking at the configured rate.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.scheduler.lock();
        let scheduler = match std::mem::replace(&mut *slot, SchedulerSlot::Lost) {
            SchedulerSlot::Idle(scheduler) => scheduler,
            running @ SchedulerSlot::Running(_) => {
                *slot = running;
                return Err(MirrorError::SchedulerAlreadyRunning);
            }
            SchedulerSlot::Lost => {
                return Err(MirrorError::SchedulerStopped(
                    "render thread was lost".to_string(),
                ));
            }
        };

        let interval = self.config.session.tick_interval();
        *slot = SchedulerSlot::Running((*scheduler).spawn(interval)?);
        tracing::info!(
            "Mirror session started at {:.1} Hz",
            self.config.session.tick_rate_hz
        );
        Ok(())
    }

    /// Stop the render thread. The session can be started again; its phase
    /// and buffered frames are kept.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self.scheduler.lock();
        match std::mem::replace(&mut *slot, SchedulerSlot::Lost) {
            SchedulerSlot::Running(handle) => {
                let scheduler = handle.stop()?;
                *slot = SchedulerSlot::Idle(Box::new(scheduler));
                tracing::info!("Mirror session stopped");
                Ok(())
            }
            other => {
                *slot = other;
                Ok(())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.scheduler.lock(), SchedulerSlot::Running(h) if h.is_running())
    }

    /// Run a single tick on the calling thread. Only valid while the render
    /// thread is not running.
    pub fn tick_once(&self) -> Result<TickOutcome> {
        match &mut *self.scheduler.lock() {
            SchedulerSlot::Idle(scheduler) => Ok(scheduler.tick()),
            SchedulerSlot::Running(_) => Err(MirrorError::SchedulerAlreadyRunning),
            SchedulerSlot::Lost => Err(MirrorError::SchedulerStopped(
                "render thread was lost".to_string(),
            )),
        }
    }

    /// Capture callback. Frames arriving while the camera is disabled are
    /// dropped; out-of-order timestamps are rejected by the queue.
    pub fn on_frame_captured(&self, pixels: PixelBuffer, timestamp_us: u64) -> Result<()> {
        if !self.camera_enabled.load(Ordering::Acquire) {
            tracing::trace!("Camera disabled, dropping frame at {}us", timestamp_us);
            return Ok(());
        }
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.queue
            .enqueue(CapturedFrame::new(timestamp_us, sequence, pixels))
    }

    /// Tell the session a preference moved; the new snapshot is taken on the
    /// next tick.
    pub fn on_preference_changed(&self, tag: PrefTag) {
        self.send(SchedulerCommand::PreferenceChanged(tag));
    }

    pub fn request_next(&self) {
        self.send(SchedulerCommand::Phase(PhaseCommand::Next));
    }

    pub fn request_back(&self) {
        self.send(SchedulerCommand::Phase(PhaseCommand::Back));
    }

    pub fn request_restart(&self) {
        self.send(SchedulerCommand::Phase(PhaseCommand::Restart));
    }

    /// Disabling drops the buffered history and its ordering guard at once,
    /// so a restarted camera may begin again from any timestamp. Status and
    /// buttons follow on the next tick.
    pub fn set_camera_enabled(&self, enabled: bool) {
        self.camera_enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.queue.clear();
        }
        self.send(SchedulerCommand::CameraEnabled(enabled));
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled.load(Ordering::Acquire)
    }

    pub fn status(&self) -> MirrorStatus {
        *self.status.read()
    }

    pub fn current_phase(&self) -> Phase {
        self.status.read().phase
    }

    pub fn current_progress(&self) -> f64 {
        self.status.read().progress
    }

    pub fn buttons(&self) -> ButtonState {
        self.status.read().buttons
    }

    /// [`ButtonState`] bits as the GUI consumes them.
    pub fn current_button_state(&self) -> i32 {
        i32::from(self.buttons().bits())
    }

    pub fn subscribe(&self) -> Receiver<MirrorEvent> {
        self.events.subscribe()
    }

    pub fn frame_queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    fn send(&self, command: SchedulerCommand) {
        // The receiver lives inside the scheduler, which the session owns.
        if self.commands.send(command).is_err() {
            tracing::warn!("Render scheduler is gone; dropping {:?}", command);
        }
    }
}

impl Drop for MirrorSession {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!("Failed to stop mirror session: {}", err);
        }
    }
}

impl std::fmt::Debug for MirrorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorSession")
            .field("status", &self.status())
            .field("queue", &self.queue)
            .finish()
    }
}

pub struct MirrorSessionBuilder {
    config: MirrorConfig,
    clock: Option<Arc<dyn Clock>>,
    preferences: Option<Arc<dyn PreferenceSource>>,
    compositor: Option<Box<dyn Compositor>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    camera_enabled: bool,
    event_capacity: usize,
}

impl MirrorSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: MirrorConfig::default(),
            clock: None,
            preferences: None,
            compositor: None,
            reporter: None,
            camera_enabled: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn config(mut self, config: MirrorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Live preference source. Without one, the config's preferences are
    /// used as a fixed snapshot.
    pub fn preferences(mut self, source: Arc<dyn PreferenceSource>) -> Self {
        self.preferences = Some(source);
        self
    }

    pub fn compositor(mut self, compositor: impl Compositor + 'static) -> Self {
        self.compositor = Some(Box::new(compositor));
        self
    }

    pub fn error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn camera_enabled(mut self, enabled: bool) -> Self {
        self.camera_enabled = enabled;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<MirrorSession> {
        let config = self.config.sanitized();
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SoftwareClock::new()));
        let preferences = self
            .preferences
            .unwrap_or_else(|| Arc::new(config.preferences));
        let compositor = self.compositor.unwrap_or_else(|| {
            tracing::warn!("No compositor configured; frames will be discarded");
            Box::new(|_: Arc<CapturedFrame>, _: f64, _: &VisualParameters| {})
        });
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(TracingErrorReporter));

        let queue = Arc::new(FrameQueue::for_session(&config.session));
        let events = Arc::new(EventBroadcaster::with_capacity(self.event_capacity));
        let status = Arc::new(RwLock::new(MirrorStatus::initial(self.camera_enabled)));
        let (commands, commands_rx) = unbounded();

        tracing::info!(
            "Frame queue holds {} frames ({:.1}s retention)",
            queue.capacity(),
            crate::core::timing::us_to_secs(queue.config().retention_us)
        );

        let scheduler = RenderScheduler::new(SchedulerParts {
            clock: Arc::clone(&clock),
            queue: Arc::clone(&queue),
            preferences,
            session: config.session,
            compositor,
            reporter,
            events: Arc::clone(&events),
            commands: commands_rx,
            status: Arc::clone(&status),
            camera_enabled: self.camera_enabled,
        });

        Ok(MirrorSession {
            config,
            clock,
            queue,
            events,
            commands,
            status,
            camera_enabled: AtomicBool::new(self.camera_enabled),
            next_sequence: AtomicU64::new(0),
            scheduler: Mutex::new(SchedulerSlot::Idle(Box::new(scheduler))),
        })
    }
}

impl Default for MirrorSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
