// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Core of the slow-mirror camera installation.
//!
//! Captured camera frames flow into a time-indexed [`FrameQueue`], a
//! [`DelayEngine`] picks which buffered frame to show for the current
//! installation [`Phase`], the [`StateMachine`] supplies opacity and filter
//! parameters as pure functions of time-in-phase, and the [`RenderScheduler`]
//! hands the result to an external [`Compositor`] once per display tick.
//!
//! Collaborators (GUI, camera driver, preference panel, projector window) talk
//! to the core through [`MirrorSession`].

#![allow(clippy::manual_clamp)] // Manual clamp is sometimes clearer
#![allow(clippy::should_implement_trait)] // Method names like `next` are contextually clear

// Re-export crossbeam_channel so subscribers can name receiver types
pub use crossbeam_channel;

pub mod core;

pub use core::{
    clamp01, secs_to_us, us_to_secs, ButtonState, CapturedFrame, Clock, ComposedFrame, Compositor,
    CompositorStats, DelayEngine, DelayMode, DelayResolution, ErrorReporter, EventBroadcaster,
    FrameQueue, FrameQueueConfig, FrameQueueState, FrameQueueStats, FrameSink, IdentityOperation,
    ImageOperation, ManualClock, MirrorConfig, MirrorError, MirrorEvent, MirrorSession,
    MirrorSessionBuilder, MirrorStatus, OffloadingCompositor, Phase, PhaseCommand, PixelBuffer,
    PixelFormat, PrefParams, PrefTag, PreferenceSource, RenderScheduler, ResolvedFrame, Result,
    SchedulerCommand, SchedulerHandle, SchedulerParts, SessionConfig, SharedPreferences,
    SoftwareClock, StateMachine, TickOutcome, TracingErrorReporter, Transition, VisualParameters,
};
