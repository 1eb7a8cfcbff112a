//! Recorder CLI
//!
//! Wires synthetic sensor sources into the session orchestrator and
//! drives them either for a fixed duration or through the distance-based
//! auto-recorder with a simulated approach profile.

use auto_record::{AutoRecordController, RecordingControl};
use orchestrator::{SessionOrchestrator, SessionResult};
use sensor_core::{
    wall_clock_secs, DetectionResult, RecorderConfig, SensorDescriptor, SensorRole,
    SyntheticSource,
};
use session_archive::DetectionSetup;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Synthetic camera payload size (stand-in for an encoded frame)
const CAMERA_PAYLOAD_LEN: usize = 4096;
/// Synthetic tactile payload size
const TACTILE_PAYLOAD_LEN: usize = 256;

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Build a session with one reference camera and `secondary_sensors`
/// tactile sensors, all backed by synthetic sources
pub fn build_orchestrator(
    output_dir: &Path,
    session_name: Option<String>,
    config: &RecorderConfig,
    secondary_sensors: usize,
) -> anyhow::Result<SessionOrchestrator> {
    let mut orchestrator = SessionOrchestrator::new(output_dir, session_name, config.clone())?;
    orchestrator.add_sensor(
        "camera_0",
        SensorRole::Reference,
        SensorDescriptor::camera("reference camera", config.target_rate_hz, 1920, 1080),
        Arc::new(SyntheticSource::new(CAMERA_PAYLOAD_LEN)),
    )?;
    for i in 1..=secondary_sensors {
        orchestrator.add_sensor(
            format!("vt_{}", i),
            SensorRole::Secondary,
            SensorDescriptor::raw(format!("tactile sensor {}", i), config.target_rate_hz),
            Arc::new(SyntheticSource::new(TACTILE_PAYLOAD_LEN)),
        )?;
    }
    orchestrator.set_detection_setup(DetectionSetup {
        enabled: true,
        marker_ids: vec![0, 1],
        ..Default::default()
    });
    Ok(orchestrator)
}

/// Session handle the auto-record controller starts and stops
///
/// Owns the orchestrator so the controller's callbacks and the frame
/// feed cannot race; the final result is stashed when the controller
/// triggers the stop.
pub struct SessionControl {
    orchestrator: SessionOrchestrator,
    result: Option<SessionResult>,
}

impl SessionControl {
    pub fn new(orchestrator: SessionOrchestrator) -> Self {
        Self {
            orchestrator,
            result: None,
        }
    }

    /// Whether a recording session is active
    pub fn is_recording(&self) -> bool {
        self.orchestrator.is_recording()
    }

    /// Feed one reference frame while recording
    pub fn record_frame(
        &mut self,
        timestamp: f64,
        result: Option<&DetectionResult>,
    ) -> anyhow::Result<()> {
        self.orchestrator.record_frame(timestamp, result)?;
        Ok(())
    }

    /// Take the result of a completed session, once
    pub fn take_result(&mut self) -> Option<SessionResult> {
        self.result.take()
    }
}

impl RecordingControl for SessionControl {
    fn start_recording(&mut self) -> anyhow::Result<()> {
        self.orchestrator.start()?;
        Ok(())
    }

    fn stop_recording(&mut self) -> anyhow::Result<()> {
        self.result = Some(self.orchestrator.stop()?);
        Ok(())
    }
}

/// Record for a fixed duration, no detection gating
pub fn run_manual(
    mut orchestrator: SessionOrchestrator,
    config: &RecorderConfig,
    duration_secs: f64,
) -> anyhow::Result<SessionResult> {
    info!("Manual recording for {:.1}s", duration_secs);
    orchestrator.start()?;

    let interval = Duration::from_secs_f64(1.0 / config.target_rate_hz);
    let start = Instant::now();
    while start.elapsed().as_secs_f64() < duration_secs {
        orchestrator.record_frame(wall_clock_secs(), None)?;
        thread::sleep(interval);
    }

    Ok(orchestrator.stop()?)
}

/// Simulated marker distance over time: far, then close for
/// `hold_secs`, then far again
fn approach_profile(t: f64, hold_secs: f64) -> f64 {
    if t < 0.3 {
        200.0
    } else if t < 0.3 + hold_secs {
        30.0
    } else {
        250.0
    }
}

fn detection_at(distance_mm: f64) -> DetectionResult {
    DetectionResult {
        left_detected: true,
        right_detected: true,
        distance_absolute_mm: Some(distance_mm),
        distance_horizontal_mm: Some(distance_mm),
        ..Default::default()
    }
}

/// Drive one full auto-record cycle with a simulated approach
///
/// The markers close in, hold for `hold_secs`, and separate; the
/// controller starts and stops the session accordingly.
pub fn run_auto(
    orchestrator: SessionOrchestrator,
    config: &RecorderConfig,
    hold_secs: f64,
) -> anyhow::Result<SessionResult> {
    info!("Auto-record cycle, holding close for {:.1}s", hold_secs);
    let mut control = SessionControl::new(orchestrator);
    let mut controller = AutoRecordController::new(config.into());
    controller.enable(true, &mut control);

    let interval = Duration::from_secs_f64(1.0 / config.target_rate_hz);
    let start = Instant::now();
    loop {
        let t = start.elapsed().as_secs_f64();
        let detection = detection_at(approach_profile(t, hold_secs));
        controller.update(&detection, &mut control);
        if control.is_recording() {
            control.record_frame(wall_clock_secs(), Some(&detection))?;
        }
        if let Some(result) = control.take_result() {
            return Ok(result);
        }
        if t > hold_secs + 10.0 {
            anyhow::bail!("auto-record cycle did not complete");
        }
        thread::sleep(interval);
    }
}

/// Log the session outcome
pub fn print_summary(result: &SessionResult) {
    info!("Session directory: {}", result.session_dir.display());
    info!("Duration: {:.1}s", result.duration_secs);
    for (sensor_id, stats) in &result.sensor_stats {
        info!(
            "  {}: {} persisted, {} dropped of {} offered",
            sensor_id, stats.persisted, stats.dropped, stats.offered
        );
    }
    match &result.archive_path {
        Some(path) => info!("Archive: {}", path.display()),
        None => info!("Archive: not written"),
    }
    for error in &result.errors {
        info!("Teardown issue: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_archive::load_archive;

    fn fast_config() -> RecorderConfig {
        RecorderConfig {
            target_rate_hz: 200.0,
            queue_capacity: 64,
            min_stable_frames: 3,
            cooldown_seconds: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn test_manual_run_produces_archive() {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config();
        let orch =
            build_orchestrator(dir.path(), Some("manual".to_string()), &config, 1).unwrap();

        let result = run_manual(orch, &config, 0.2).unwrap();
        assert!(result.errors.is_empty());
        let archive = load_archive(&result.archive_path.unwrap()).unwrap();
        assert!(!archive.reference_timestamps.is_empty());
        assert!(archive.streams.contains_key("vt_1"));
    }

    #[test]
    fn test_auto_cycle_starts_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config();
        let orch = build_orchestrator(dir.path(), Some("auto".to_string()), &config, 1).unwrap();

        let result = run_auto(orch, &config, 0.3).unwrap();
        assert!(result.errors.is_empty());
        let archive = load_archive(&result.archive_path.unwrap()).unwrap();
        // Frames were only fed while recording, so every reference frame
        // carries the close-range detection.
        assert!(!archive.reference_timestamps.is_empty());
        let summary = archive.summary.unwrap();
        assert_eq!(summary.left_detection_rate, 1.0);
        assert!(summary.distance_max_mm <= 30.0 + 1e-9);
    }

    #[test]
    fn test_session_control_seam() {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config();
        let orch =
            build_orchestrator(dir.path(), Some("seam".to_string()), &config, 1).unwrap();
        let mut control = SessionControl::new(orch);

        assert!(!control.is_recording());
        control.start_recording().unwrap();
        assert!(control.is_recording());
        control
            .record_frame(wall_clock_secs(), Some(&detection_at(25.0)))
            .unwrap();
        control.stop_recording().unwrap();
        assert!(!control.is_recording());
        assert!(control.take_result().is_some());
        assert!(control.take_result().is_none());
    }
}
