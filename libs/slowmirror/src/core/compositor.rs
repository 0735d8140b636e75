// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Renderer-side collaborators.
//!
//! The render loop only ever calls [`Compositor::submit_for_display`], which
//! must return promptly. Pixel math lives behind [`ImageOperation`] and is
//! run off the render thread by [`OffloadingCompositor`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender, TrySendError};

use crate::core::frames::{CapturedFrame, PixelBuffer};
use crate::core::visual::VisualParameters;
use crate::core::Result;

/// Receives one resolved frame per rendered tick.
pub trait Compositor: Send {
    fn submit_for_display(
        &mut self,
        frame: Arc<CapturedFrame>,
        weight: f64,
        params: &VisualParameters,
    );
}

impl<F> Compositor for F
where
    F: FnMut(Arc<CapturedFrame>, f64, &VisualParameters) + Send,
{
    fn submit_for_display(
        &mut self,
        frame: Arc<CapturedFrame>,
        weight: f64,
        params: &VisualParameters,
    ) {
        self(frame, weight, params)
    }
}

/// Pluggable pixel filter (contrast, brightness window, bloom, deterioration).
pub trait ImageOperation: Send {
    fn apply(&mut self, frame: &CapturedFrame, weight: f64, params: &VisualParameters)
    -> PixelBuffer;
}

/// Passes pixels through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityOperation;

impl ImageOperation for IdentityOperation {
    fn apply(&mut self, frame: &CapturedFrame, _weight: f64, _params: &VisualParameters) -> PixelBuffer {
        frame.pixels.clone()
    }
}

/// Output of an [`ImageOperation`], ready for the projector surface.
#[derive(Debug, Clone)]
pub struct ComposedFrame {
    pub source_sequence: u64,
    pub source_timestamp_us: u64,
    pub weight: f64,
    pub params: VisualParameters,
    pub pixels: PixelBuffer,
}

/// Final destination of composed frames (projector window, preview, file).
pub trait FrameSink: Send {
    fn present(&mut self, frame: ComposedFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(ComposedFrame) + Send,
{
    fn present(&mut self, frame: ComposedFrame) {
        self(frame)
    }
}

struct CompositeJob {
    frame: Arc<CapturedFrame>,
    weight: f64,
    params: VisualParameters,
}

#[derive(Debug, Default)]
struct CompositorCounters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    presented: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub submitted: u64,
    /// Jobs discarded because the worker was still busy.
    pub dropped: u64,
    pub presented: u64,
}

/// Runs an [`ImageOperation`] on a dedicated worker thread.
///
/// Submissions go through a bounded channel with `try_send`; when the worker
/// falls behind, new frames are dropped rather than stalling the render loop.
pub struct OffloadingCompositor {
    sender: Option<Sender<CompositeJob>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<CompositorCounters>,
}

impl OffloadingCompositor {
    pub const DEFAULT_QUEUE_DEPTH: usize = 2;

    pub fn new<O, S>(operation: O, sink: S) -> Result<Self>
    where
        O: ImageOperation + 'static,
        S: FrameSink + 'static,
    {
        Self::with_queue_depth(operation, sink, Self::DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_queue_depth<O, S>(mut operation: O, mut sink: S, depth: usize) -> Result<Self>
    where
        O: ImageOperation + 'static,
        S: FrameSink + 'static,
    {
        let (tx, rx) = bounded::<CompositeJob>(depth.max(1));
        let counters = Arc::new(CompositorCounters::default());
        let worker_counters = Arc::clone(&counters);

        let worker = std::thread::Builder::new()
            .name("slowmirror-compositor".to_string())
            .spawn(move || {
                tracing::debug!("Compositor worker started");
                for job in rx {
                    let pixels = operation.apply(&job.frame, job.weight, &job.params);
                    sink.present(ComposedFrame {
                        source_sequence: job.frame.sequence,
                        source_timestamp_us: job.frame.timestamp_us,
                        weight: job.weight,
                        params: job.params,
                        pixels,
                    });
                    worker_counters.presented.fetch_add(1, Ordering::Relaxed);
                }
                tracing::debug!("Compositor worker exiting");
            })?;

        Ok(Self {
            sender: Some(tx),
            worker: Some(worker),
            counters,
        })
    }

    pub fn stats(&self) -> CompositorStats {
        CompositorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            presented: self.counters.presented.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work, let the worker finish what is queued and join it.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Compositor worker panicked");
            }
        }
    }
}

impl Compositor for OffloadingCompositor {
    fn submit_for_display(
        &mut self,
        frame: Arc<CapturedFrame>,
        weight: f64,
        params: &VisualParameters,
    ) {
        let Some(sender) = &self.sender else {
            return;
        };
        let job = CompositeJob {
            frame,
            weight,
            params: *params,
        };
        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(job)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Compositor busy, dropping frame {}", job.frame.sequence);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Compositor worker is gone; frame discarded");
                self.sender = None;
            }
        }
    }
}

impl Drop for OffloadingCompositor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for OffloadingCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadingCompositor")
            .field("running", &self.worker.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}
