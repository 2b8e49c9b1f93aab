//! # Runtime Configuration
//!
//! Settings for a headless run, loadable from a JSON file. Every field has a
//! default, so a file only needs the keys it changes:
//!
//! ```json
//! { "maxFrames": 300, "limits": { "call_timeout_ms": 50 } }
//! ```

use resources::SandboxLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest `dt` handed to a guest, in seconds
pub const DEFAULT_FRAME_CAP: f64 = 0.05;

/// Simulated time between frames in headless runs
pub const DEFAULT_FRAME_DT: f64 = 1.0 / 60.0;

pub const DEFAULT_MAX_FRAMES: u64 = 600;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Host runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostRuntimeConfig {
    /// Per-instance ceilings
    pub limits: SandboxLimits,
    /// Upper clamp on `dt`
    pub frame_cap: f64,
    /// `dt` fed to every frame of a headless run
    pub frame_dt: f64,
    /// Frames to run when no script is given, and a hard stop otherwise
    pub max_frames: u64,
    pub sample_rate: u32,
    /// Seed for noise voices and synthesized sounds
    pub seed: u64,
    /// Where to write the final frame as PNG
    pub snapshot: Option<PathBuf>,
    /// Input script driving the run
    pub script: Option<PathBuf>,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            limits: SandboxLimits::default(),
            frame_cap: DEFAULT_FRAME_CAP,
            frame_dt: DEFAULT_FRAME_DT,
            max_frames: DEFAULT_MAX_FRAMES,
            sample_rate: audio_synth::DEFAULT_SAMPLE_RATE,
            seed: 0,
            snapshot: None,
            script: None,
        }
    }
}

impl HostRuntimeConfig {
    /// Loads and validates a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |field: &'static str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {value}"),
                })
            }
        };
        positive("frameCap", self.frame_cap)?;
        positive("frameDt", self.frame_dt)?;

        if self.max_frames == 0 {
            return Err(ConfigError::Invalid {
                field: "maxFrames",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "sampleRate",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.limits.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.call_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
