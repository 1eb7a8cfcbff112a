//! Captured sample payloads

use std::time::{SystemTime, UNIX_EPOCH};

/// One captured sensor payload
///
/// The payload bytes are opaque to the recording core; codec details
/// belong to the concrete sensor driver. The optional hardware sequence
/// number comes from drivers that stamp frames themselves (e.g. a
/// depth-camera SDK) and is used to skip duplicate reads.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Encoded payload bytes
    pub payload: Vec<u8>,
    /// Hardware-provided frame sequence number, if the driver exposes one
    pub hardware_seq: Option<u64>,
}

impl Sample {
    /// Create a sample from raw payload bytes
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            hardware_seq: None,
        }
    }

    /// Create a sample with a hardware sequence number
    pub fn with_hardware_seq(payload: Vec<u8>, seq: u64) -> Self {
        Self {
            payload,
            hardware_seq: Some(seq),
        }
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch
///
/// Capture timestamps and the reference timeline share this clock so
/// cross-stream alignment works without an extra offset.
pub fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
