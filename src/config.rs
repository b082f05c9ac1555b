//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KickError;

/// Fixed sample rate of every processed export, independent of the live
/// monitoring rate.
pub const EXPORT_SAMPLE_RATE: u32 = 44_100;

/// Longest tail or silent render accepted, in seconds.
pub const MAX_RENDER_SECS: f64 = 10.0;

/// Tunable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Silence appended after the source so filter and compressor tails
    /// are captured (seconds).
    pub tail_pad_secs: f64,
    /// Length of the near-silent render produced when no decoder accepts
    /// the source (seconds).
    pub silent_render_secs: f64,
    /// Sequencer tempo on startup (BPM).
    pub default_tempo: f64,
    /// Monitor volume on startup (0–100).
    pub default_monitor_volume: u8,
    /// Library preset synthesized when the processing graph must be bypassed.
    pub fallback_preset: String,
    /// Largest block the monitor engine renders in one pass; larger device
    /// buffers are split.
    pub max_block_frames: usize,
    /// Capacity of the command and step-event queues.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tail_pad_secs: 0.5,
            silent_render_secs: 0.5,
            default_tempo: 136.0,
            default_monitor_volume: 75,
            fallback_preset: "ice-crystal".to_string(),
            max_block_frames: 1024,
            queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, KickError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load a configuration file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, KickError> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Pull every field into its working range. Applied by [`from_json`],
    /// and again wherever a config enters the engine, since the fields are
    /// public.
    ///
    /// [`from_json`]: EngineConfig::from_json
    pub(crate) fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.tail_pad_secs = finite_or(self.tail_pad_secs, defaults.tail_pad_secs).clamp(0.0, MAX_RENDER_SECS);
        self.silent_render_secs =
            finite_or(self.silent_render_secs, defaults.silent_render_secs).clamp(0.01, MAX_RENDER_SECS);
        self.default_tempo = finite_or(self.default_tempo, defaults.default_tempo).clamp(60.0, 200.0);
        self.default_monitor_volume = self.default_monitor_volume.min(100);
        self.max_block_frames = self.max_block_frames.clamp(16, 16_384);
        self.queue_capacity = self.queue_capacity.max(16);
        self
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
