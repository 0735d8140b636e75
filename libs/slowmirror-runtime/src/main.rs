// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Slow mirror runtime binary
//!
//! Runs a mirror session headless: a synthetic camera feeds moving gradient
//! frames, composed frames are logged instead of projected, and the phase is
//! driven from the terminal.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use slowmirror::crossbeam_channel::{select, tick};
use slowmirror::{
    Clock, ComposedFrame, FrameSink, IdentityOperation, MirrorConfig, MirrorEvent, MirrorSession,
    OffloadingCompositor, PixelBuffer, PixelFormat, PrefTag, PreferenceSource, SharedPreferences,
};
use tracing_appender::non_blocking::WorkerGuard;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "slowmirror-runtime")]
#[command(author, version, about = "Slow mirror installation runtime", long_about = None)]
struct Args {
    /// Configuration file (YAML or TOML). Defaults to ./slowmirror.yaml if present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Synthetic camera frame rate
    #[arg(long = "camera-fps", default_value = "30")]
    camera_fps: f64,

    /// Synthetic frame width in pixels
    #[arg(long, default_value = "64")]
    width: u32,

    /// Synthetic frame height in pixels
    #[arg(long, default_value = "48")]
    height: u32,

    /// Stop after this many seconds (runs until `q` or Ctrl+C otherwise)
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Log file (defaults to ~/.slowmirror/logs/slowmirror-runtime.log)
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Write the default configuration to PATH and exit
    #[arg(long = "write-default-config", value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn get_logs_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".slowmirror").join("logs"))
}

fn setup_file_logging(log_file: Option<&Path>) -> Result<(WorkerGuard, PathBuf)> {
    use tracing_subscriber::prelude::*;

    let log_path = match log_file {
        Some(path) => path.to_path_buf(),
        None => get_logs_dir()?.join("slowmirror-runtime.log"),
    };
    let logs_dir = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(logs_dir)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Log path has no file name: {}", log_path.display()))?;

    let file_appender = tracing_appender::rolling::never(logs_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok((guard, log_path))
}

// ---------------------------------------------------------------------------
// Synthetic camera
// ---------------------------------------------------------------------------

/// Moving horizontal gradient, one step per frame.
fn gradient_frame(width: u32, height: u32, frame_index: u64) -> PixelBuffer {
    let format = PixelFormat::Bgra8;
    let mut data = Vec::with_capacity(width as usize * height as usize * format.bytes_per_pixel());
    let shift = (frame_index % 256) as u32;
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 255 / width.max(1) + shift) % 256) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            data.extend_from_slice(&[v, g, 255 - v, 255]);
        }
    }
    PixelBuffer::new(width, height, format, data)
}

fn spawn_camera(
    session: Arc<MirrorSession>,
    shutdown: Arc<AtomicBool>,
    fps: f64,
    width: u32,
    height: u32,
) -> Result<JoinHandle<()>> {
    let interval = Duration::from_secs_f64(1.0 / fps.clamp(1.0, 240.0));
    let handle = std::thread::Builder::new()
        .name("synthetic-camera".to_string())
        .spawn(move || {
            tracing::info!("Synthetic camera {}x{} @ {:.1} fps", width, height, fps);
            let ticker = tick(interval);
            let mut frame_index = 0u64;
            while !shutdown.load(Ordering::Relaxed) {
                if ticker.recv().is_err() {
                    break;
                }
                let timestamp_us = session.clock().now_us();
                let pixels = gradient_frame(width, height, frame_index);
                // Rejections are already logged by the queue.
                let _ = session.on_frame_captured(pixels, timestamp_us);
                frame_index += 1;
            }
            tracing::info!("Synthetic camera stopped after {} frames", frame_index);
        })?;
    Ok(handle)
}

// ---------------------------------------------------------------------------
// Logging compositor
// ---------------------------------------------------------------------------

/// Stands in for the projector window.
struct LoggingSink {
    presented: u64,
    last_report: Instant,
}

impl LoggingSink {
    fn new() -> Self {
        Self {
            presented: 0,
            last_report: Instant::now(),
        }
    }
}

impl FrameSink for LoggingSink {
    fn present(&mut self, frame: ComposedFrame) {
        self.presented += 1;
        tracing::trace!(
            "Presented #{} (t={}us, weight {:.2}, opacity {:.2})",
            frame.source_sequence,
            frame.source_timestamp_us,
            frame.weight,
            frame.params.opacity
        );
        if self.last_report.elapsed() >= Duration::from_secs(5) {
            tracing::info!(
                "{} frames presented; showing #{} with deterioration {:.2}, opacity {:.2}, rain {:.2}",
                self.presented,
                frame.source_sequence,
                frame.weight,
                frame.params.opacity,
                frame.params.rain_opacity
            );
            self.last_report = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

const CONSOLE_HELP: &str = "commands: n next | b back | r restart | c camera on/off | s status | p <pref> <value> | q quit";

fn print_status(session: &MirrorSession) {
    let status = session.status();
    let queue = session.frame_queue();
    println!(
        "phase {} ({:.0}%) | delay {:.2}s | camera {} | buttons {:#06b} | queue {}/{}",
        status.phase,
        status.progress * 100.0,
        status.delay_secs,
        if status.camera_enabled { "on" } else { "off" },
        session.current_button_state(),
        queue.len(),
        queue.capacity()
    );
}

fn handle_console_line(
    line: &str,
    session: &MirrorSession,
    prefs: &SharedPreferences,
    shutdown: &AtomicBool,
) {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("n") => session.request_next(),
        Some("b") => session.request_back(),
        Some("r") => session.request_restart(),
        Some("c") => session.set_camera_enabled(!session.camera_enabled()),
        Some("s") => print_status(session),
        Some("q") => shutdown.store(true, Ordering::Relaxed),
        Some("p") => {
            let tag = words.next().and_then(PrefTag::from_key);
            let value = words.next().and_then(|v| v.parse::<f64>().ok());
            match (tag, value) {
                (Some(tag), Some(value)) => {
                    prefs.set(tag, value);
                    session.on_preference_changed(tag);
                    println!("{} = {}", tag, prefs.snapshot().sanitized().get(tag));
                }
                _ => {
                    let keys: Vec<_> = PrefTag::ALL.iter().map(|t| t.key()).collect();
                    println!("usage: p <{}> <value>", keys.join("|"));
                }
            }
        }
        Some(_) => println!("{}", CONSOLE_HELP),
        None => {}
    }
}

fn spawn_console(
    session: Arc<MirrorSession>,
    prefs: SharedPreferences,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    // Detached: a blocking stdin read cannot be interrupted portably.
    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            println!("{}", CONSOLE_HELP);
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                handle_console_line(line.trim(), &session, &prefs, &shutdown);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn load_config(args: &Args) -> Result<MirrorConfig> {
    let mut config = match &args.config {
        Some(path) => MirrorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MirrorConfig::load_or_default(Path::new(MirrorConfig::FILE_NAME)),
    };
    config.session.expected_frame_rate = args.camera_fps;
    Ok(config.sanitized())
}

fn log_event(event: &MirrorEvent) {
    match event {
        MirrorEvent::PhaseChanged {
            from,
            to,
            automatic,
            ..
        } => {
            let how = if *automatic { "timeout" } else { "command" };
            tracing::info!("{} -> {} ({})", from, to, how);
        }
        MirrorEvent::TransitionRejected { phase, command } => {
            tracing::info!("'{}' is not available in {}", command, phase);
        }
        MirrorEvent::CameraToggled { enabled } => {
            tracing::info!("Camera {}", if *enabled { "on" } else { "off" });
        }
        MirrorEvent::PreferenceChanged { tag } => tracing::debug!("Preference {} applied", tag),
        MirrorEvent::FrameDisplayed { .. } | MirrorEvent::TickSkipped { .. } => {}
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (_log_guard, log_path) = setup_file_logging(args.log_file.as_deref())?;
    tracing::info!("Log file: {}", log_path.display());

    if let Some(path) = &args.write_default_config {
        MirrorConfig::default()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        return Ok(());
    }

    let config = load_config(&args)?;
    let prefs = SharedPreferences::new(config.preferences);

    let compositor = OffloadingCompositor::new(IdentityOperation, LoggingSink::new())
        .context("Failed to start compositor")?;

    let session = Arc::new(
        MirrorSession::builder()
            .config(config)
            .preferences(Arc::new(prefs.clone()))
            .compositor(compositor)
            .build()?,
    );
    let events = session.subscribe();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            tracing::info!("Ctrl+C received, shutting down");
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    session.start()?;
    let camera = spawn_camera(
        Arc::clone(&session),
        Arc::clone(&shutdown),
        args.camera_fps,
        args.width,
        args.height,
    )?;
    spawn_console(Arc::clone(&session), prefs, Arc::clone(&shutdown))?;

    let started = Instant::now();
    let deadline = args.duration.map(|secs| Duration::from_secs_f64(secs.max(0.0)));
    let poll = tick(Duration::from_millis(100));

    while !shutdown.load(Ordering::Relaxed) {
        select! {
            recv(events) -> event => match event {
                Ok(event) => log_event(&event),
                Err(_) => break,
            },
            recv(poll) -> _ => {
                if deadline.is_some_and(|d| started.elapsed() >= d) {
                    tracing::info!("Duration reached");
                    break;
                }
            }
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    if camera.join().is_err() {
        tracing::error!("Camera thread panicked");
    }
    session.stop()?;

    let stats = session.frame_queue().stats();
    tracing::info!(
        "Done: {} frames captured, {} rejected, {} evicted; final phase {}",
        stats.enqueued,
        stats.rejected,
        stats.evicted,
        session.current_phase()
    );
    Ok(())
}
