//! Frame records, recording statistics, and the per-sensor manifest

use serde::{Deserialize, Serialize};

/// One persisted frame's bookkeeping entry
///
/// Never mutated after creation. Sequence numbers are 0-based and
/// strictly increasing within one sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Monotonic per-sensor sequence number, starting at 0
    pub sequence: u64,
    /// Capture timestamp (seconds, shared session clock)
    pub timestamp: f64,
    /// Hardware-provided sequence number, if the driver exposes one
    pub hardware_seq: Option<u64>,
    /// Filename of the persisted payload within the sensor directory
    pub filename: String,
}

/// Per-sensor recording statistics
///
/// Invariant: `offered == persisted + dropped` at all times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Samples pulled from the source and offered to the queue
    pub offered: u64,
    /// Samples written to disk
    pub persisted: u64,
    /// Samples discarded (queue full, sink failure, or drain timeout)
    pub dropped: u64,
}

impl RecordingStats {
    /// Samples still sitting in the queue
    ///
    /// Saturating because the three counters are read one by one while
    /// the worker threads keep advancing them.
    pub fn in_flight(&self) -> u64 {
        self.offered.saturating_sub(self.persisted + self.dropped)
    }
}

/// Serialized per-sensor metadata artifact, written at pipeline stop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorManifest {
    /// Sensor identifier
    pub sensor_id: String,
    /// Target capture rate (Hz)
    pub target_rate_hz: f64,
    /// Storage file extension
    pub extension: String,
    /// All persisted frames, in write order
    pub records: Vec<FrameRecord>,
    /// Total samples offered by the capture loop
    pub offered: u64,
    /// Total samples persisted
    pub persisted: u64,
    /// Total samples dropped
    pub dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_round_trip() {
        let manifest = SensorManifest {
            sensor_id: "vt_1".to_string(),
            target_rate_hz: 30.0,
            extension: "png".to_string(),
            records: vec![
                FrameRecord {
                    sequence: 0,
                    timestamp: 100.25,
                    hardware_seq: Some(7),
                    filename: "frame_000000.png".to_string(),
                },
                FrameRecord {
                    sequence: 1,
                    timestamp: 100.29,
                    hardware_seq: None,
                    filename: "frame_000001.png".to_string(),
                },
            ],
            offered: 3,
            persisted: 2,
            dropped: 1,
        };

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        let back: SensorManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records.len(), 2);
        assert_eq!(back.records[0].hardware_seq, Some(7));
        assert_eq!(back.offered, back.persisted + back.dropped);
    }

    #[test]
    fn test_in_flight() {
        let stats = RecordingStats {
            offered: 10,
            persisted: 6,
            dropped: 1,
        };
        assert_eq!(stats.in_flight(), 3);
    }
}
