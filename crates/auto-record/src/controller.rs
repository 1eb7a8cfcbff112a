//! Hysteresis state machine implementation

use crate::{AutoRecordState, RecordingControl};
use sensor_core::{DetectionResult, RecorderConfig};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Thresholds and timing for the hysteresis state machine
///
/// `start_threshold_mm < stop_threshold_mm` is a caller invariant; the
/// controller does not re-check it.
#[derive(Debug, Clone)]
pub struct AutoRecordConfig {
    /// Distance below which the controller arms (mm)
    pub start_threshold_mm: f64,
    /// Distance above which an active recording stops (mm)
    pub stop_threshold_mm: f64,
    /// Use the horizontal-plane distance instead of the absolute one
    pub use_horizontal_distance: bool,
    /// Quiet period after a stop before re-arming
    pub cooldown: Duration,
    /// Require both markers detected before any frame is considered
    pub require_both_markers: bool,
    /// Consecutive close frames required before recording starts
    pub min_stable_frames: u32,
}

impl From<&RecorderConfig> for AutoRecordConfig {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            start_threshold_mm: config.start_threshold_mm,
            stop_threshold_mm: config.stop_threshold_mm,
            use_horizontal_distance: config.use_horizontal_distance,
            cooldown: Duration::from_secs_f64(config.cooldown_seconds),
            require_both_markers: config.require_both_markers,
            min_stable_frames: config.min_stable_frames,
        }
    }
}

/// Snapshot of the controller's position, for status displays
#[derive(Debug, Clone)]
pub struct StateInfo {
    /// Current state
    pub state: AutoRecordState,
    /// Consecutive below-start-threshold frames seen while armed
    pub stable_frames: u32,
    /// Frames needed before recording starts
    pub min_stable_frames: u32,
    /// Distance from the last gated frame (mm)
    pub last_distance_mm: Option<f64>,
    /// How long the active recording has been running
    pub recording_duration: Option<Duration>,
    /// Time left in the cooldown window
    pub cooldown_remaining: Option<Duration>,
}

/// Distance-driven recording controller
///
/// Fed one detection result per reference frame; decides when to start
/// and stop recording via the [`RecordingControl`] seam. The start
/// threshold sits below the stop threshold so a hand hovering near
/// either edge cannot flap the recorder on and off.
pub struct AutoRecordController {
    config: AutoRecordConfig,
    state: AutoRecordState,
    stable_frames: u32,
    last_distance_mm: Option<f64>,
    recording_since: Option<Instant>,
    cooldown_until: Option<Instant>,
}

impl AutoRecordController {
    /// Build a controller, initially disabled
    pub fn new(config: AutoRecordConfig) -> Self {
        Self {
            config,
            state: AutoRecordState::Disabled,
            stable_frames: 0,
            last_distance_mm: None,
            recording_since: None,
            cooldown_until: None,
        }
    }

    /// Turn the controller on or off
    ///
    /// Disabling while a recording is active stops the recording first,
    /// so an operator toggle never leaves a session running unattended.
    pub fn enable(&mut self, enabled: bool, control: &mut dyn RecordingControl) {
        if enabled {
            if self.state == AutoRecordState::Disabled {
                info!("Auto-record enabled");
                self.state = AutoRecordState::Idle;
                self.stable_frames = 0;
                self.cooldown_until = None;
            }
        } else if self.state != AutoRecordState::Disabled {
            if self.state == AutoRecordState::Recording {
                if let Err(e) = control.stop_recording() {
                    error!("Stop on disable failed: {}", e);
                }
            }
            info!("Auto-record disabled");
            self.state = AutoRecordState::Disabled;
            self.stable_frames = 0;
            self.recording_since = None;
            self.cooldown_until = None;
        }
    }

    /// Stop an active recording immediately and enter cooldown
    pub fn force_stop(&mut self, control: &mut dyn RecordingControl) {
        if self.state == AutoRecordState::Recording {
            info!("Force stop requested");
            self.trigger_stop(control);
        }
    }

    /// Process one detection result
    ///
    /// Frames failing the both-markers gate are discarded before state
    /// dispatch, so an armed controller falls back to idle but cooldown
    /// time only elapses on frames that pass the gate.
    pub fn update(
        &mut self,
        result: &DetectionResult,
        control: &mut dyn RecordingControl,
    ) -> AutoRecordState {
        if self.state == AutoRecordState::Disabled {
            return self.state;
        }

        if self.config.require_both_markers && result.detection_count() < 2 {
            if self.state == AutoRecordState::Armed {
                debug!("Marker lost while armed, back to idle");
                self.state = AutoRecordState::Idle;
                self.stable_frames = 0;
            }
            return self.state;
        }

        let distance = result.distance_mm(self.config.use_horizontal_distance);
        self.last_distance_mm = distance;

        match self.state {
            AutoRecordState::Idle => {
                if let Some(d) = distance {
                    if d < self.config.start_threshold_mm {
                        debug!("Distance {:.1} mm below start threshold, arming", d);
                        self.state = AutoRecordState::Armed;
                        self.stable_frames = 1;
                    }
                }
            }
            AutoRecordState::Armed => match distance {
                Some(d) if d < self.config.start_threshold_mm => {
                    self.stable_frames += 1;
                    if self.stable_frames >= self.config.min_stable_frames {
                        self.trigger_start(control);
                    }
                }
                _ => {
                    debug!("Distance left the start band, back to idle");
                    self.state = AutoRecordState::Idle;
                    self.stable_frames = 0;
                }
            },
            AutoRecordState::Recording => {
                if let Some(d) = distance {
                    if d > self.config.stop_threshold_mm {
                        info!("Distance {:.1} mm above stop threshold, stopping", d);
                        self.trigger_stop(control);
                    }
                }
            }
            AutoRecordState::Cooldown => {
                let expired = self
                    .cooldown_until
                    .map(|until| Instant::now() >= until)
                    .unwrap_or(true);
                if expired {
                    debug!("Cooldown over, back to idle");
                    self.state = AutoRecordState::Idle;
                    self.cooldown_until = None;
                }
            }
            AutoRecordState::Disabled => {}
        }

        self.state
    }

    /// Current state
    pub fn state(&self) -> AutoRecordState {
        self.state
    }

    /// Detailed status snapshot
    pub fn state_info(&self) -> StateInfo {
        StateInfo {
            state: self.state,
            stable_frames: self.stable_frames,
            min_stable_frames: self.config.min_stable_frames,
            last_distance_mm: self.last_distance_mm,
            recording_duration: self.recording_since.map(|since| since.elapsed()),
            cooldown_remaining: self
                .cooldown_until
                .map(|until| until.saturating_duration_since(Instant::now())),
        }
    }

    /// Start the recording; on failure stay armed and retry on later
    /// close frames
    fn trigger_start(&mut self, control: &mut dyn RecordingControl) {
        match control.start_recording() {
            Ok(()) => {
                info!(
                    "Auto-record started after {} stable frames",
                    self.stable_frames
                );
                self.state = AutoRecordState::Recording;
                self.recording_since = Some(Instant::now());
            }
            Err(e) => {
                error!("Recording start failed, staying armed: {}", e);
            }
        }
    }

    /// Stop the recording and enter cooldown even on failure, so the
    /// controller never wedges in the recording state
    fn trigger_stop(&mut self, control: &mut dyn RecordingControl) {
        if let Err(e) = control.stop_recording() {
            warn!("Recording stop failed: {}", e);
        }
        self.state = AutoRecordState::Cooldown;
        self.stable_frames = 0;
        self.recording_since = None;
        self.cooldown_until = Some(Instant::now() + self.config.cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Control double counting calls, optionally failing starts
    #[derive(Default)]
    struct SpyControl {
        starts: u32,
        stops: u32,
        fail_start: bool,
    }

    impl RecordingControl for SpyControl {
        fn start_recording(&mut self) -> anyhow::Result<()> {
            if self.fail_start {
                anyhow::bail!("camera offline");
            }
            self.starts += 1;
            Ok(())
        }

        fn stop_recording(&mut self) -> anyhow::Result<()> {
            self.stops += 1;
            Ok(())
        }
    }

    fn both_markers_at(distance: f64) -> DetectionResult {
        DetectionResult {
            left_detected: true,
            right_detected: true,
            distance_absolute_mm: Some(distance),
            distance_horizontal_mm: Some(distance),
            ..Default::default()
        }
    }

    fn one_marker() -> DetectionResult {
        DetectionResult {
            left_detected: true,
            ..Default::default()
        }
    }

    fn controller(cooldown_seconds: f64) -> AutoRecordController {
        let recorder_config = RecorderConfig {
            start_threshold_mm: 50.0,
            stop_threshold_mm: 150.0,
            min_stable_frames: 5,
            cooldown_seconds,
            ..Default::default()
        };
        AutoRecordController::new(AutoRecordConfig::from(&recorder_config))
    }

    #[test]
    fn test_disabled_ignores_frames() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        for _ in 0..10 {
            assert_eq!(
                ctrl.update(&both_markers_at(10.0), &mut control),
                AutoRecordState::Disabled
            );
        }
        assert_eq!(control.starts, 0);
    }

    #[test]
    fn test_arming_and_stable_frame_countdown() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);

        let expected = [
            (200.0, AutoRecordState::Idle),
            (200.0, AutoRecordState::Idle),
            (45.0, AutoRecordState::Armed),
            (44.0, AutoRecordState::Armed),
            (43.0, AutoRecordState::Armed),
            (42.0, AutoRecordState::Armed),
            (41.0, AutoRecordState::Recording),
            (40.0, AutoRecordState::Recording),
        ];
        for (distance, want) in expected {
            assert_eq!(ctrl.update(&both_markers_at(distance), &mut control), want);
        }
        assert_eq!(control.starts, 1);
    }

    #[test]
    fn test_band_between_thresholds_changes_nothing() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);

        // 100 mm is inside the hysteresis band: no arming while idle.
        assert_eq!(
            ctrl.update(&both_markers_at(100.0), &mut control),
            AutoRecordState::Idle
        );

        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(ctrl.state(), AutoRecordState::Recording);

        // And no stopping while recording.
        assert_eq!(
            ctrl.update(&both_markers_at(100.0), &mut control),
            AutoRecordState::Recording
        );
        assert_eq!(control.stops, 0);
    }

    #[test]
    fn test_interrupted_stability_resets() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);

        for _ in 0..4 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        // One far frame resets the count.
        assert_eq!(
            ctrl.update(&both_markers_at(200.0), &mut control),
            AutoRecordState::Idle
        );
        // Four more close frames are not enough again.
        for _ in 0..4 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(ctrl.state(), AutoRecordState::Armed);
        assert_eq!(control.starts, 0);
    }

    #[test]
    fn test_lost_marker_disarms_but_keeps_recording() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);

        ctrl.update(&both_markers_at(40.0), &mut control);
        assert_eq!(ctrl.state(), AutoRecordState::Armed);
        assert_eq!(
            ctrl.update(&one_marker(), &mut control),
            AutoRecordState::Idle
        );

        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(ctrl.state(), AutoRecordState::Recording);
        // A lost marker while recording does not stop the session.
        assert_eq!(
            ctrl.update(&one_marker(), &mut control),
            AutoRecordState::Recording
        );
        assert_eq!(control.stops, 0);
    }

    #[test]
    fn test_cooldown_blocks_rearming() {
        let mut ctrl = controller(0.05);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);

        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(
            ctrl.update(&both_markers_at(200.0), &mut control),
            AutoRecordState::Cooldown
        );
        assert_eq!(control.stops, 1);

        // Close frames during cooldown do not re-arm.
        assert_eq!(
            ctrl.update(&both_markers_at(40.0), &mut control),
            AutoRecordState::Cooldown
        );

        thread::sleep(Duration::from_millis(60));
        assert_eq!(
            ctrl.update(&both_markers_at(200.0), &mut control),
            AutoRecordState::Idle
        );
        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(control.starts, 2);
    }

    #[test]
    fn test_start_failure_keeps_armed() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl {
            fail_start: true,
            ..Default::default()
        };
        ctrl.enable(true, &mut control);

        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(ctrl.state(), AutoRecordState::Armed);

        // Once the control recovers, the next close frame retries.
        control.fail_start = false;
        assert_eq!(
            ctrl.update(&both_markers_at(40.0), &mut control),
            AutoRecordState::Recording
        );
        assert_eq!(control.starts, 1);
    }

    #[test]
    fn test_disable_while_recording_stops_first() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);
        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }
        assert_eq!(ctrl.state(), AutoRecordState::Recording);
        assert!(ctrl.state_info().recording_duration.is_some());

        ctrl.enable(false, &mut control);
        assert_eq!(ctrl.state(), AutoRecordState::Disabled);
        assert!(ctrl.state_info().recording_duration.is_none());
        assert_eq!(control.stops, 1);
    }

    #[test]
    fn test_force_stop_enters_cooldown() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);
        for _ in 0..5 {
            ctrl.update(&both_markers_at(40.0), &mut control);
        }

        ctrl.force_stop(&mut control);
        assert_eq!(ctrl.state(), AutoRecordState::Cooldown);
        assert_eq!(control.stops, 1);
        assert!(ctrl.state_info().cooldown_remaining.is_some());

        // Idempotent outside the recording state.
        ctrl.force_stop(&mut control);
        assert_eq!(control.stops, 1);
    }

    #[test]
    fn test_missing_distance_makes_no_decision() {
        let mut ctrl = controller(2.0);
        let mut control = SpyControl::default();
        ctrl.enable(true, &mut control);

        // Both markers visible but the camera is uncalibrated.
        let no_distance = DetectionResult {
            left_detected: true,
            right_detected: true,
            ..Default::default()
        };
        assert_eq!(
            ctrl.update(&no_distance, &mut control),
            AutoRecordState::Idle
        );

        ctrl.update(&both_markers_at(40.0), &mut control);
        assert_eq!(ctrl.state(), AutoRecordState::Armed);
        // While armed, a distance-less frame counts as leaving the band.
        assert_eq!(
            ctrl.update(&no_distance, &mut control),
            AutoRecordState::Idle
        );
    }
}
