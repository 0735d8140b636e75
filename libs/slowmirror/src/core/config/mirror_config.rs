// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Installation configuration file (`slowmirror.yaml` or `slowmirror.toml`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{PrefParams, SessionConfig};
use crate::core::{MirrorError, Result};

/// Initial preferences plus session tuning, as stored on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub preferences: PrefParams,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            other => Err(MirrorError::Configuration(format!(
                "Unsupported config extension {:?} for {} (expected .yaml, .yml or .toml)",
                other,
                path.display()
            ))),
        }
    }
}

impl MirrorConfig {
    /// Default configuration file name.
    pub const FILE_NAME: &'static str = "slowmirror.yaml";

    /// Load configuration from `path`. Returns error if the file is missing,
    /// has an unknown extension or cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            MirrorError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::parse(&content, format).map_err(|e| {
            MirrorError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::info!("Loaded slow mirror config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from `path`, returning defaults if the file is
    /// missing or unparseable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Write configuration to `path` in the format implied by its extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| MirrorError::Configuration(format!("YAML encode failed: {}", e)))?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| MirrorError::Configuration(format!("TOML encode failed: {}", e)))?,
        };
        std::fs::write(path, content)?;
        tracing::info!("Wrote slow mirror config to {}", path.display());
        Ok(())
    }

    /// Both halves clamped into their valid ranges.
    pub fn sanitized(&self) -> Self {
        Self {
            preferences: self.preferences.sanitized(),
            session: self.session.sanitized(),
        }
    }

    fn parse(content: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}
