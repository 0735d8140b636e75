// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod mirror_config;
mod prefs;
mod session_config;

pub use mirror_config::MirrorConfig;
pub use prefs::{PrefParams, PrefTag, PreferenceSource, SharedPreferences};
pub use session_config::{DelayMode, SessionConfig};
