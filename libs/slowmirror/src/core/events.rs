// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Session event fan-out.
//!
//! Each subscriber gets its own bounded channel. Publishing uses `try_send`,
//! so a slow or absent GUI never stalls the render tick; events that do not
//! fit are dropped for that subscriber only.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::PrefTag;
use crate::core::phase::{ButtonState, Phase, PhaseCommand};
use crate::core::state_machine::Transition;

/// Default per-subscriber queue depth.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MirrorEvent {
    PhaseChanged {
        from: Phase,
        to: Phase,
        at_us: u64,
        automatic: bool,
        /// GUI controls enabled in the new phase.
        buttons: u8,
    },
    FrameDisplayed {
        sequence: u64,
        timestamp_us: u64,
        weight: f64,
        phase: Phase,
    },
    /// No frame was available for the tick; nothing was submitted.
    TickSkipped { phase: Phase, at_us: u64 },
    PreferenceChanged { tag: PrefTag },
    CameraToggled { enabled: bool },
    TransitionRejected { phase: Phase, command: PhaseCommand },
}

impl MirrorEvent {
    pub fn phase_changed(transition: &Transition, buttons: ButtonState) -> Self {
        Self::PhaseChanged {
            from: transition.from,
            to: transition.to,
            at_us: transition.at_us,
            automatic: transition.automatic,
            buttons: buttons.bits(),
        }
    }
}

pub struct EventBroadcaster {
    capacity: usize,
    senders: Mutex<Vec<Sender<MirrorEvent>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: Mutex::new(Vec::new()),
        }
    }

    /// New receiver for all events published from now on.
    pub fn subscribe(&self) -> Receiver<MirrorEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver `event` to every subscriber without blocking. Subscribers whose
    /// receiver was dropped are forgotten.
    pub fn publish(&self, event: MirrorEvent) {
        let mut senders = self.senders.lock();
        senders.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Event subscriber full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn clear(&self) {
        self.senders.lock().clear();
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
