//! Sensor Core Library
//!
//! Shared types for the multi-sensor recording system:
//! - Sample and frame source abstraction over physical sensors
//! - Detection results produced by the marker pipeline
//! - Sensor descriptors and storage formats
//! - Recorder configuration with validated, typed fields

pub mod config;
pub mod descriptor;
pub mod detection;
pub mod sample;
pub mod source;
pub mod synthetic;

pub use config::RecorderConfig;
pub use descriptor::{SensorDescriptor, SensorRole, StorageFormat};
pub use detection::DetectionResult;
pub use sample::{wall_clock_secs, Sample};
pub use source::FrameSource;
pub use synthetic::SyntheticSource;

use thiserror::Error;

/// Frame source error types
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Sample read failed: {0}")]
    Read(String),
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
