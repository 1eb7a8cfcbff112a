//! Recorder configuration

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Recording system configuration
///
/// All knobs in one typed struct, validated once at construction.
/// `start_threshold_mm < stop_threshold_mm` is a caller invariant: the
/// hysteresis band only exists when the start threshold sits below the
/// stop threshold, and the auto-record controller does not re-check it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Default capture rate for sensor pipelines (Hz)
    pub target_rate_hz: f64,
    /// Bounded queue capacity between capture and writer threads
    /// (300 frames buffers ~10 s at 30 Hz)
    pub queue_capacity: usize,
    /// Distance below which the auto-recorder arms (mm)
    pub start_threshold_mm: f64,
    /// Distance above which the auto-recorder stops (mm)
    pub stop_threshold_mm: f64,
    /// Use the horizontal-plane distance instead of the absolute 3-D distance
    pub use_horizontal_distance: bool,
    /// Quiet period after an auto-stop before re-arming (seconds)
    pub cooldown_seconds: f64,
    /// Require both markers detected before the auto-recorder reacts
    pub require_both_markers: bool,
    /// Consecutive below-threshold frames required before recording starts
    pub min_stable_frames: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            target_rate_hz: 30.0,
            queue_capacity: 300,
            start_threshold_mm: 50.0,
            stop_threshold_mm: 150.0,
            use_horizontal_distance: true,
            cooldown_seconds: 2.0,
            require_both_markers: true,
            min_stable_frames: 5,
        }
    }
}

impl RecorderConfig {
    /// Load configuration from a file, layered with `RECORDER_*` env vars
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("RECORDER"))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let cfg: RecorderConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;

        info!("Loaded recorder configuration from {}", path.display());
        Ok(cfg)
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "target_rate_hz must be positive, got {}",
                self.target_rate_hz
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.min_stable_frames == 0 {
            return Err(ConfigError::Invalid(
                "min_stable_frames must be at least 1".to_string(),
            ));
        }
        if self.cooldown_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cooldown_seconds must be non-negative, got {}",
                self.cooldown_seconds
            )));
        }
        if self.start_threshold_mm >= self.stop_threshold_mm {
            // Caller invariant, not an error: an inverted band removes
            // the hysteresis margin but the state machine still runs.
            warn!(
                "start_threshold_mm {} >= stop_threshold_mm {}: no hysteresis band",
                self.start_threshold_mm, self.stop_threshold_mm
            );
        }
        Ok(())
    }
}
