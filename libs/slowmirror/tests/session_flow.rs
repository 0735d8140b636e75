// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Drives a full session by hand with a manual clock.

use std::sync::Arc;

use parking_lot::Mutex;
use slowmirror::{
    ButtonState, CapturedFrame, Clock, DelayMode, ManualClock, MirrorConfig, MirrorEvent,
    MirrorSession, Phase, PixelBuffer, PixelFormat, PrefParams, PrefTag, SessionConfig,
    SharedPreferences, TickOutcome, VisualParameters,
};

const SEC: u64 = 1_000_000;

type Submissions = Arc<Mutex<Vec<(u64, f64, VisualParameters)>>>;

struct Rig {
    session: MirrorSession,
    clock: Arc<ManualClock>,
    prefs: SharedPreferences,
    submissions: Submissions,
}

fn rig(params: PrefParams, session: SessionConfig) -> Rig {
    let clock = Arc::new(ManualClock::new(0));
    let prefs = SharedPreferences::new(params);
    let submissions: Submissions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&submissions);

    let session = MirrorSession::builder()
        .config(MirrorConfig {
            preferences: params,
            session,
        })
        .clock(clock.clone())
        .preferences(Arc::new(prefs.clone()))
        .compositor(
            move |frame: Arc<CapturedFrame>, weight: f64, params: &VisualParameters| {
                sink.lock().push((frame.timestamp_us, weight, *params));
            },
        )
        .build()
        .unwrap();

    Rig {
        session,
        clock,
        prefs,
        submissions,
    }
}

fn capture(rig: &Rig, timestamp_us: u64) {
    rig.session
        .on_frame_captured(PixelBuffer::blank(4, 4, PixelFormat::Bgra8), timestamp_us)
        .unwrap();
}

fn tick_at(rig: &Rig, now_us: u64) -> TickOutcome {
    rig.clock.set_us(now_us);
    rig.session.tick_once().unwrap()
}

fn walk_to(rig: &Rig, phase: Phase) {
    while rig.session.current_phase() != phase {
        rig.session.request_next();
        tick_at(rig, rig.clock.now_us());
    }
}

#[test]
fn test_full_installation_sequence() {
    let params = PrefParams {
        fade_in_time: 2.0,
        camera_fade_out_time: 1.0,
        rain_fade_out_time: 1.0,
        ..PrefParams::default()
    };
    let rig = rig(params, SessionConfig::default());
    capture(&rig, 0);

    walk_to(&rig, Phase::FadeIn);
    // FadeIn times out on its own.
    tick_at(&rig, 2 * SEC);
    assert_eq!(rig.session.current_phase(), Phase::NoDelay);

    walk_to(&rig, Phase::CameraFadeOut);
    tick_at(&rig, 3 * SEC);
    assert_eq!(rig.session.current_phase(), Phase::OnlyRain);

    walk_to(&rig, Phase::FadeOut);
    tick_at(&rig, 4 * SEC);
    assert_eq!(rig.session.current_phase(), Phase::BlackAtEnd);

    // Only restart leaves the end.
    rig.session.request_next();
    tick_at(&rig, 5 * SEC);
    assert_eq!(rig.session.current_phase(), Phase::BlackAtEnd);
    assert!(!rig.session.buttons().contains(ButtonState::NEXT));

    rig.session.request_restart();
    tick_at(&rig, 6 * SEC);
    assert_eq!(rig.session.current_phase(), Phase::BlackAtBeginning);
}

#[test]
fn test_restart_mid_delayed() {
    let rig = rig(PrefParams::default(), SessionConfig::default());
    capture(&rig, 0);
    walk_to(&rig, Phase::Delayed);

    for s in 1..=8 {
        capture(&rig, s * SEC);
        tick_at(&rig, s * SEC);
    }
    assert_eq!(rig.session.current_phase(), Phase::Delayed);
    assert!(rig.session.status().delay_secs > 0.0);

    rig.session.request_restart();
    assert_eq!(rig.session.current_phase(), Phase::Delayed, "applied on next tick");

    tick_at(&rig, 9 * SEC);
    let status = rig.session.status();
    assert_eq!(status.phase, Phase::BlackAtBeginning);
    assert_eq!(status.progress, 0.0);
    assert_eq!(status.delay_secs, 0.0);
}

#[test]
fn test_fixed_delay_scenario() {
    let params = PrefParams {
        deterioration_time: 2.0,
        ..PrefParams::default()
    };
    let session = SessionConfig {
        delay_mode: DelayMode::Fixed { seconds: 5.0 },
        ..SessionConfig::default()
    };
    let rig = rig(params, session);
    capture(&rig, 0);
    walk_to(&rig, Phase::Delayed);

    for s in 1..=10 {
        capture(&rig, s * SEC);
    }
    let outcome = tick_at(&rig, 10 * SEC);

    match outcome {
        TickOutcome::Rendered {
            timestamp_us,
            weight,
            ..
        } => {
            assert_eq!(timestamp_us, 5 * SEC);
            assert_eq!(weight, 1.0);
        }
        TickOutcome::Skipped => panic!("expected the frame at 5s"),
    }
    let last = *rig.submissions.lock().last().unwrap();
    assert_eq!(last.0, 5 * SEC);
}

#[test]
fn test_session_start_skips_until_history_exists() {
    let session = SessionConfig {
        delay_mode: DelayMode::Fixed { seconds: 5.0 },
        ..SessionConfig::default()
    };
    let rig = rig(PrefParams::default(), session);
    let events = rig.session.subscribe();

    capture(&rig, 10 * SEC);
    rig.clock.set_us(10 * SEC);
    walk_to(&rig, Phase::Delayed);

    rig.submissions.lock().clear();
    assert_eq!(tick_at(&rig, 12 * SEC), TickOutcome::Skipped);
    assert!(rig.submissions.lock().is_empty());
    assert!(
        events
            .try_iter()
            .any(|e| matches!(e, MirrorEvent::TickSkipped { phase: Phase::Delayed, .. }))
    );
}

#[test]
fn test_events_follow_commands() {
    let rig = rig(PrefParams::default(), SessionConfig::default());
    let events = rig.session.subscribe();

    rig.session.request_back();
    rig.session.request_next();
    tick_at(&rig, SEC);

    let received: Vec<_> = events.try_iter().collect();
    assert!(matches!(
        received[0],
        MirrorEvent::TransitionRejected {
            phase: Phase::ProjectionOff,
            ..
        }
    ));
    assert!(matches!(
        received[1],
        MirrorEvent::PhaseChanged {
            from: Phase::ProjectionOff,
            to: Phase::BlackAtBeginning,
            automatic: false,
            ..
        }
    ));
}

#[test]
fn test_preference_change_applies_on_next_tick() {
    let rig = rig(PrefParams::default(), SessionConfig::default());
    capture(&rig, 0);
    walk_to(&rig, Phase::NoDelay);

    rig.prefs.set(PrefTag::MaxContrast, 6.0);
    tick_at(&rig, SEC);
    assert_eq!(rig.submissions.lock().last().unwrap().2.contrast, 2.5);

    rig.session.on_preference_changed(PrefTag::MaxContrast);
    tick_at(&rig, 2 * SEC);
    assert_eq!(rig.submissions.lock().last().unwrap().2.contrast, 6.0);
}

#[test]
fn test_camera_toggle_clears_history() {
    let rig = rig(PrefParams::default(), SessionConfig::default());
    for s in 0..5 {
        capture(&rig, s * SEC);
    }

    rig.session.set_camera_enabled(false);
    tick_at(&rig, 5 * SEC);
    assert!(rig.session.frame_queue().is_empty());
    assert!(!rig.session.buttons().contains(ButtonState::NEXT));

    rig.session.set_camera_enabled(true);
    tick_at(&rig, 6 * SEC);
    // Timestamps may restart after a camera change.
    capture(&rig, SEC);
    assert_eq!(rig.session.frame_queue().len(), 1);
    assert!(rig.session.buttons().contains(ButtonState::NEXT));
}

#[test]
fn test_render_thread_ticks_in_background() {
    let session = MirrorSession::builder()
        .config(MirrorConfig {
            preferences: PrefParams::default(),
            session: SessionConfig {
                tick_rate_hz: 200.0,
                ..SessionConfig::default()
            },
        })
        .build()
        .unwrap();
    let events = session.subscribe();

    session.start().unwrap();
    session.request_next();

    let event = events
        .iter()
        .find(|e| matches!(e, MirrorEvent::PhaseChanged { .. }))
        .unwrap();
    assert!(matches!(
        event,
        MirrorEvent::PhaseChanged {
            to: Phase::BlackAtBeginning,
            ..
        }
    ));

    session.stop().unwrap();
    assert!(!session.is_running());
    assert_eq!(session.current_phase(), Phase::BlackAtBeginning);
}

#[test]
fn test_camera_restart_without_tick_accepts_earlier_timestamps() {
    let rig = rig(PrefParams::default(), SessionConfig::default());
    for s in 0..5 {
        capture(&rig, s * SEC);
    }

    // No tick between the toggles.
    rig.session.set_camera_enabled(false);
    assert!(rig.session.frame_queue().is_empty());
    rig.session.set_camera_enabled(true);

    capture(&rig, SEC);
    capture(&rig, 2 * SEC);
    assert_eq!(rig.session.frame_queue().len(), 2);

    // The queued toggles must not wipe frames captured after re-enabling.
    tick_at(&rig, 3 * SEC);
    assert_eq!(rig.session.frame_queue().len(), 2);
    assert!(rig.session.status().camera_enabled);
}

#[test]
fn test_absurd_max_delay_is_clamped() {
    let session = MirrorSession::builder()
        .config(MirrorConfig {
            preferences: PrefParams::default(),
            session: SessionConfig {
                max_delay_secs: 1e18,
                ..SessionConfig::default()
            },
        })
        .clock(Arc::new(ManualClock::new(0)))
        .build()
        .unwrap();

    let queue = session.frame_queue();
    assert!(queue.capacity() <= (SessionConfig::MAX_DELAY_LIMIT_SECS * 30.0) as usize + 16);
    session
        .on_frame_captured(PixelBuffer::blank(4, 4, PixelFormat::Bgra8), SEC)
        .unwrap();
    assert_eq!(queue.len(), 1);
}
