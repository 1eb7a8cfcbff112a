//! Marker detection results

use serde::{Deserialize, Serialize};

/// Per-frame marker detection result
///
/// Produced by the external detection pipeline for each reference-camera
/// frame. Distances are only present when the detector could compute
/// them; a missing value is a real `Option::None`, never a NaN sentinel
/// that could be confused with a zero-distance reading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Left marker detected in this frame
    pub left_detected: bool,
    /// Right marker detected in this frame
    pub right_detected: bool,
    /// Absolute 3-D distance between markers (mm)
    pub distance_absolute_mm: Option<f64>,
    /// Horizontal-plane (XY) distance between markers (mm)
    pub distance_horizontal_mm: Option<f64>,
    /// Pixel-space distance between marker centers
    pub distance_pixel: Option<f64>,
    /// Left marker 3-D position (mm)
    pub left_position: Option<[f64; 3]>,
    /// Right marker 3-D position (mm)
    pub right_position: Option<[f64; 3]>,
    /// Hardware frame sequence number the detection ran on
    pub hardware_seq: Option<u64>,
}

impl DetectionResult {
    /// Number of markers detected in this frame (0..=2)
    pub fn detection_count(&self) -> u32 {
        self.left_detected as u32 + self.right_detected as u32
    }

    /// Distance used for auto-record decisions
    pub fn distance_mm(&self, use_horizontal: bool) -> Option<f64> {
        if use_horizontal {
            self.distance_horizontal_mm
        } else {
            self.distance_absolute_mm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_count() {
        let mut r = DetectionResult::default();
        assert_eq!(r.detection_count(), 0);
        r.left_detected = true;
        assert_eq!(r.detection_count(), 1);
        r.right_detected = true;
        assert_eq!(r.detection_count(), 2);
    }

    #[test]
    fn test_distance_selection() {
        let r = DetectionResult {
            distance_absolute_mm: Some(120.0),
            distance_horizontal_mm: Some(80.0),
            ..Default::default()
        };
        assert_eq!(r.distance_mm(true), Some(80.0));
        assert_eq!(r.distance_mm(false), Some(120.0));
    }
}
