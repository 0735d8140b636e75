// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use crate::core::phase::{Phase, PhaseCommand};

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(
        "Out-of-order capture: timestamp {timestamp_us}us is not after last enqueued {last_timestamp_us}us"
    )]
    OutOfOrderFrame {
        timestamp_us: u64,
        last_timestamp_us: u64,
    },

    #[error("Transition '{command}' is not valid from phase {phase}")]
    InvalidTransition { phase: Phase, command: PhaseCommand },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Render scheduler is already running")]
    SchedulerAlreadyRunning,

    #[error("Render scheduler has stopped: {0}")]
    SchedulerStopped(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Sink for non-fatal errors raised on the render thread.
///
/// The render loop never aborts on these; it hands them to the reporter and
/// carries on in its current phase.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &MirrorError);
}

/// Default reporter: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &MirrorError) {
        tracing::warn!("{}", error);
    }
}
