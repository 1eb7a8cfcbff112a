//! Per-frame distance samples and session summary statistics

use sensor_core::DetectionResult;
use serde::{Deserialize, Serialize};

/// Distance measurements recorded for one reference frame
///
/// Fields are independent: a frame may have both markers detected but no
/// pose-derived distances (uncalibrated camera), or one marker and a
/// pixel distance only. Missing is represented explicitly, never as a
/// sentinel value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistanceSample {
    /// Left marker detected
    pub left_detected: bool,
    /// Right marker detected
    pub right_detected: bool,
    /// Absolute 3-D distance (mm)
    pub distance_absolute_mm: Option<f64>,
    /// Horizontal-plane distance (mm)
    pub distance_horizontal_mm: Option<f64>,
    /// Pixel-space distance
    pub distance_pixel: Option<f64>,
    /// Left marker 3-D position (mm)
    pub left_position: Option<[f64; 3]>,
    /// Right marker 3-D position (mm)
    pub right_position: Option<[f64; 3]>,
}

impl DistanceSample {
    /// Sample for a reference frame that carried no detection result
    pub fn missing() -> Self {
        Self::default()
    }

    /// Build from a detection result
    pub fn from_detection(result: &DetectionResult) -> Self {
        Self {
            left_detected: result.left_detected,
            right_detected: result.right_detected,
            distance_absolute_mm: result.distance_absolute_mm,
            distance_horizontal_mm: result.distance_horizontal_mm,
            distance_pixel: result.distance_pixel,
            left_position: result.left_position,
            right_position: result.right_position,
        }
    }
}

/// Summary statistics over a session's distance samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Fraction of frames with the left marker detected
    pub left_detection_rate: f64,
    /// Fraction of frames with the right marker detected
    pub right_detection_rate: f64,
    /// Number of frames with a non-missing absolute distance
    pub measured_frames: u64,
    /// Minimum absolute distance (mm)
    pub distance_min_mm: f64,
    /// Mean absolute distance (mm)
    pub distance_mean_mm: f64,
    /// Maximum absolute distance (mm)
    pub distance_max_mm: f64,
    /// Standard deviation of the absolute distance (mm)
    pub distance_std_mm: f64,
    /// Mean horizontal distance over non-missing samples (mm)
    pub horizontal_mean_mm: Option<f64>,
}

impl DetectionSummary {
    /// Compute summary statistics; `None` when no frame carries an
    /// absolute distance.
    pub fn compute(samples: &[DistanceSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let measured: Vec<f64> = samples
            .iter()
            .filter_map(|s| s.distance_absolute_mm)
            .collect();
        if measured.is_empty() {
            return None;
        }

        let n = measured.len() as f64;
        let mean = measured.iter().sum::<f64>() / n;
        let var = measured.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let min = measured.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = measured.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let horizontal: Vec<f64> = samples
            .iter()
            .filter_map(|s| s.distance_horizontal_mm)
            .collect();
        let horizontal_mean = if horizontal.is_empty() {
            None
        } else {
            Some(horizontal.iter().sum::<f64>() / horizontal.len() as f64)
        };

        let total = samples.len() as f64;
        Some(Self {
            left_detection_rate: samples.iter().filter(|s| s.left_detected).count() as f64 / total,
            right_detection_rate: samples.iter().filter(|s| s.right_detected).count() as f64
                / total,
            measured_frames: measured.len() as u64,
            distance_min_mm: min,
            distance_mean_mm: mean,
            distance_max_mm: max,
            distance_std_mm: var.sqrt(),
            horizontal_mean_mm: horizontal_mean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(abs: f64, horizontal: f64) -> DistanceSample {
        DistanceSample {
            left_detected: true,
            right_detected: true,
            distance_absolute_mm: Some(abs),
            distance_horizontal_mm: Some(horizontal),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_sample_has_no_values() {
        let s = DistanceSample::missing();
        assert!(!s.left_detected);
        assert!(s.distance_absolute_mm.is_none());
        assert!(s.left_position.is_none());
    }

    #[test]
    fn test_summary_ignores_missing() {
        let samples = vec![
            measured(100.0, 90.0),
            DistanceSample::missing(),
            measured(200.0, 110.0),
        ];
        let summary = DetectionSummary::compute(&samples).unwrap();
        assert_eq!(summary.measured_frames, 2);
        assert_eq!(summary.distance_min_mm, 100.0);
        assert_eq!(summary.distance_max_mm, 200.0);
        assert!((summary.distance_mean_mm - 150.0).abs() < 1e-9);
        assert!((summary.horizontal_mean_mm.unwrap() - 100.0).abs() < 1e-9);
        // Detection rate counts all frames, including the missing one.
        assert!((summary.left_detection_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_none_without_measurements() {
        assert!(DetectionSummary::compute(&[]).is_none());
        let only_missing = vec![DistanceSample::missing(), DistanceSample::missing()];
        assert!(DetectionSummary::compute(&only_missing).is_none());
    }
}
