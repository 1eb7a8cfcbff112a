//! Capture Pipeline
//!
//! One capture thread + one writer thread + one bounded queue per
//! physical sensor. The capture side polls the sensor's frame source at
//! its target rate and never blocks: when the queue is full the sample
//! is dropped and counted. The writer side persists samples under
//! zero-padded sequential names and keeps the in-memory manifest.

mod pipeline;
mod record;

pub use pipeline::SensorPipeline;
pub use record::{FrameRecord, RecordingStats, SensorManifest};

use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid target rate {rate_hz} Hz for '{sensor_id}'")]
    InvalidRate { sensor_id: String, rate_hz: f64 },

    #[error("Source unavailable for '{sensor_id}': {reason}")]
    SourceUnavailable { sensor_id: String, reason: String },

    #[error("Failed to initialize sink for '{sensor_id}': {reason}")]
    SinkInit { sensor_id: String, reason: String },

    #[error("Pipeline '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Pipeline '{0}' is not running")]
    NotRunning(String),

    #[error("Failed to write manifest for '{sensor_id}': {reason}")]
    Manifest { sensor_id: String, reason: String },
}
