//! Static sensor metadata

use serde::{Deserialize, Serialize};

/// How a sensor's samples are persisted on disk
///
/// The recording core treats payloads as opaque bytes; the format only
/// selects the file extension under the sensor's session subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageFormat {
    Png,
    Jpeg,
    Raw,
}

impl StorageFormat {
    /// File extension for persisted sample files
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Png => "png",
            StorageFormat::Jpeg => "jpg",
            StorageFormat::Raw => "bin",
        }
    }
}

/// Role of a sensor within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorRole {
    /// Provides the session's reference timeline
    Reference,
    /// Aligned against the reference timeline at finalize
    Secondary,
}

/// Static per-sensor metadata, set once before recording starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// Human-readable sensor name
    pub name: String,
    /// Target sample rate (Hz)
    pub target_rate_hz: f64,
    /// Expected resolution (width, height), if the sensor is image-like
    pub resolution: Option<(u32, u32)>,
    /// Storage format for persisted samples
    pub format: StorageFormat,
}

impl SensorDescriptor {
    /// Descriptor for an image sensor at the given rate
    pub fn camera(name: impl Into<String>, rate_hz: f64, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            target_rate_hz: rate_hz,
            resolution: Some((width, height)),
            format: StorageFormat::Png,
        }
    }

    /// Descriptor for a raw-payload sensor (e.g. tactile displacement data)
    pub fn raw(name: impl Into<String>, rate_hz: f64) -> Self {
        Self {
            name: name.into(),
            target_rate_hz: rate_hz,
            resolution: None,
            format: StorageFormat::Raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(StorageFormat::Png.extension(), "png");
        assert_eq!(StorageFormat::Raw.extension(), "bin");
    }

    #[test]
    fn test_descriptor_helpers() {
        let d = SensorDescriptor::camera("oak", 30.0, 1920, 1080);
        assert_eq!(d.resolution, Some((1920, 1080)));
        assert_eq!(d.format, StorageFormat::Png);

        let d = SensorDescriptor::raw("tac3d", 100.0);
        assert!(d.resolution.is_none());
        assert_eq!(d.format, StorageFormat::Raw);
    }
}
