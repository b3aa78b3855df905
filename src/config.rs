//! Configuration management
//!
//! Settings are read from a TOML file. Missing sections and fields fall back
//! to the defaults below.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::AudioFormat;
use crate::buffer::OverflowPolicy;
use crate::constants::{DEFAULT_MAX_PENDING, DEFAULT_MIN_AUDIO_UNIT_BYTES};
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
}

/// Video routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Handles held per eye while its sink is not ready
    pub max_pending: usize,
    /// Eviction rule once `max_pending` is reached
    pub overflow_policy: OverflowPolicy,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Audio routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Units shorter than this are dropped as transport noise
    pub min_unit_bytes: usize,
    /// Format assumed before the sender announces one
    pub initial_format: Option<AudioFormat>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            min_unit_bytes: DEFAULT_MIN_AUDIO_UNIT_BYTES,
            initial_format: None,
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from the per-user config location, or use defaults if absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Per-user config file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mirror-fanout").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.video.max_pending == 0 && self.video.overflow_policy != OverflowPolicy::Unbounded {
            return Err(Error::Config(
                "video.max_pending must be at least 1 unless overflow_policy is unbounded".into(),
            ));
        }
        Ok(())
    }
}
