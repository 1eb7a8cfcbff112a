//! Session-level metadata

use chrono::{DateTime, Utc};
use sensor_core::SensorDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker detection setup recorded with the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSetup {
    /// Whether marker detection ran during this session
    pub enabled: bool,
    /// Target marker identities (left, right order)
    pub marker_ids: Vec<u32>,
    /// Physical marker edge length (meters)
    pub marker_size_m: f64,
    /// Whether the reference camera was calibrated
    pub calibrated: bool,
    /// Marker dictionary name
    pub dictionary: String,
}

impl Default for DetectionSetup {
    fn default() -> Self {
        Self {
            enabled: false,
            marker_ids: Vec::new(),
            marker_size_m: 0.015,
            calibrated: false,
            dictionary: "DICT_6X6_250".to_string(),
        }
    }
}

/// Session metadata, created empty and populated over the session's life
///
/// `start_time`, `end_time`, and `duration_secs` are each set exactly
/// once, by the recording window's start and stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session name (also the session directory name)
    pub session_name: String,
    /// Wall-clock start of the recording window
    pub start_time: Option<DateTime<Utc>>,
    /// Wall-clock end of the recording window
    pub end_time: Option<DateTime<Utc>>,
    /// Recording duration in seconds
    pub duration_secs: f64,
    /// Registered sensors by id
    pub sensors: BTreeMap<String, SensorDescriptor>,
    /// Marker detection setup
    pub detection: DetectionSetup,
}

impl SessionMetadata {
    /// Empty metadata for a freshly constructed session
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            start_time: None,
            end_time: None,
            duration_secs: 0.0,
            sensors: BTreeMap::new(),
            detection: DetectionSetup::default(),
        }
    }
}
