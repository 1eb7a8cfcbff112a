//! Session lifecycle coordination

use crate::SessionError;
use capture_pipeline::{RecordingStats, SensorPipeline};
use chrono::Local;
use sensor_core::{DetectionResult, FrameSource, RecorderConfig, Sample, SensorDescriptor, SensorRole};
use session_archive::{DetectionSetup, SessionArchive};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// One registered sensor and its recording pipeline
struct SensorEntry {
    role: SensorRole,
    pipeline: SensorPipeline,
}

/// Outcome of a completed session
///
/// Carries per-sensor statistics and everything that went wrong during
/// teardown. A non-empty `errors` list means some artifacts are
/// incomplete, not that the session is lost.
#[derive(Debug)]
pub struct SessionResult {
    /// Root directory of the session's artifacts
    pub session_dir: PathBuf,
    /// Recording duration in seconds
    pub duration_secs: f64,
    /// Final statistics per sensor id
    pub sensor_stats: BTreeMap<String, RecordingStats>,
    /// Path of the finalized archive, absent when finalize failed
    pub archive_path: Option<PathBuf>,
    /// Teardown failures, one message per failed step
    pub errors: Vec<String>,
}

/// Coordinates one recording session across sensors and the archive
///
/// Start is all-or-nothing: if any pipeline fails to start, those
/// already started are rolled back and the session stays idle. Stop is
/// best-effort: every pipeline is stopped and the archive is always
/// finalized, with individual failures collected instead of aborting.
pub struct SessionOrchestrator {
    session_name: String,
    session_dir: PathBuf,
    config: RecorderConfig,
    sensors: Vec<SensorEntry>,
    archive: SessionArchive,
    recording: bool,
    started_at: Option<Instant>,
}

impl SessionOrchestrator {
    /// Create a session under `output_dir`, generating a timestamped
    /// name when none is given
    pub fn new(
        output_dir: &Path,
        session_name: Option<String>,
        config: RecorderConfig,
    ) -> Result<Self, SessionError> {
        let session_name = session_name
            .unwrap_or_else(|| Local::now().format("session_%Y%m%d_%H%M%S").to_string());
        let session_dir = output_dir.join(&session_name);
        fs::create_dir_all(&session_dir)?;

        info!("Session '{}' at {}", session_name, session_dir.display());
        let archive = SessionArchive::new(&session_dir, &session_name);
        Ok(Self {
            session_name,
            session_dir,
            config,
            sensors: Vec::new(),
            archive,
            recording: false,
            started_at: None,
        })
    }

    /// Register a sensor before the session starts
    ///
    /// Registration order is preserved: pipelines start in this order
    /// and stop in the same order.
    pub fn add_sensor(
        &mut self,
        sensor_id: impl Into<String>,
        role: SensorRole,
        descriptor: SensorDescriptor,
        source: Arc<dyn FrameSource>,
    ) -> Result<(), SessionError> {
        if self.recording {
            return Err(SessionError::RegisterWhileRecording);
        }
        let sensor_id = sensor_id.into();
        if self.sensors.iter().any(|e| e.pipeline.sensor_id() == sensor_id) {
            return Err(SessionError::DuplicateSensor(sensor_id));
        }

        info!("Registered sensor '{}' ({:?})", sensor_id, role);
        let pipeline = SensorPipeline::new(
            sensor_id,
            source,
            descriptor,
            &self.session_dir,
            self.config.queue_capacity,
        );
        self.sensors.push(SensorEntry { role, pipeline });
        Ok(())
    }

    /// Record the marker detection setup into the session metadata
    pub fn set_detection_setup(&mut self, setup: DetectionSetup) {
        self.archive.set_detection_setup(setup);
    }

    /// Start all pipelines, rolling back on the first failure
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.recording {
            return Err(SessionError::AlreadyRecording);
        }
        if self.sensors.is_empty() {
            return Err(SessionError::NoSensors);
        }

        // Open the archive window first so no started pipeline can
        // outrun it.
        self.archive.start_recording();
        for entry in &self.sensors {
            self.archive.register_sensor_metadata(
                entry.pipeline.sensor_id(),
                entry.pipeline.descriptor().clone(),
            );
        }

        for i in 0..self.sensors.len() {
            if let Err(e) = self.sensors[i].pipeline.start() {
                error!("Start failed, rolling back {} started pipelines: {}", i, e);
                for started in &mut self.sensors[..i] {
                    if let Err(stop_err) = started.pipeline.stop() {
                        warn!(
                            "Rollback stop failed for '{}': {}",
                            started.pipeline.sensor_id(),
                            stop_err
                        );
                    }
                }
                self.archive.cancel();
                return Err(e.into());
            }
        }

        self.recording = true;
        self.started_at = Some(Instant::now());
        info!(
            "Session '{}' recording with {} sensors",
            self.session_name,
            self.sensors.len()
        );
        Ok(())
    }

    /// Feed one reference frame into the session time axis
    pub fn record_frame(
        &mut self,
        timestamp: f64,
        result: Option<&DetectionResult>,
    ) -> Result<(), SessionError> {
        if !self.recording {
            return Err(SessionError::NotRecording);
        }
        self.archive.record_reference_frame(timestamp, result);
        Ok(())
    }

    /// Stop all pipelines and finalize the archive
    ///
    /// Individual pipeline failures are collected, never fatal; the
    /// archive is finalized regardless so partial sessions still leave
    /// an inspectable artifact.
    pub fn stop(&mut self) -> Result<SessionResult, SessionError> {
        if !self.recording {
            return Err(SessionError::NotRecording);
        }
        self.recording = false;
        self.archive.stop_recording();

        let mut errors = Vec::new();
        let mut sensor_stats = BTreeMap::new();
        for entry in &mut self.sensors {
            let id = entry.pipeline.sensor_id().to_string();
            let stats = match entry.pipeline.stop() {
                Ok(stats) => stats,
                Err(e) => {
                    errors.push(format!("stop '{}': {}", id, e));
                    entry.pipeline.stats()
                }
            };
            if entry.role == SensorRole::Secondary {
                self.archive
                    .add_secondary_timestamps(&id, entry.pipeline.frame_timestamps());
            }
            sensor_stats.insert(id, stats);
        }

        let archive_path = match self.archive.finalize() {
            Ok(path) => Some(path),
            Err(e) => {
                errors.push(format!("finalize archive: {}", e));
                None
            }
        };

        let duration_secs = self
            .started_at
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        info!(
            "Session '{}' stopped after {:.1}s ({} errors)",
            self.session_name,
            duration_secs,
            errors.len()
        );
        Ok(SessionResult {
            session_dir: self.session_dir.clone(),
            duration_secs,
            sensor_stats,
            archive_path,
            errors,
        })
    }

    /// Live statistics snapshot for every registered sensor
    pub fn stats(&self) -> BTreeMap<String, RecordingStats> {
        self.sensors
            .iter()
            .map(|e| (e.pipeline.sensor_id().to_string(), e.pipeline.stats()))
            .collect()
    }

    /// Most recent sample from a sensor, for preview paths
    pub fn preview(&self, sensor_id: &str) -> Option<Sample> {
        self.sensors
            .iter()
            .find(|e| e.pipeline.sensor_id() == sensor_id)
            .and_then(|e| e.pipeline.preview())
    }

    /// Registered sensor ids, in registration order
    pub fn sensor_ids(&self) -> Vec<&str> {
        self.sensors.iter().map(|e| e.pipeline.sensor_id()).collect()
    }

    /// Number of pipelines whose capture loop is currently running
    pub fn running_sensor_count(&self) -> usize {
        self.sensors.iter().filter(|e| e.pipeline.is_running()).count()
    }

    /// Reference frames recorded so far
    pub fn frame_count(&self) -> usize {
        self.archive.frame_count()
    }

    /// Whether a recording session is active
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Session name (also the session directory name)
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Root directory of the session's artifacts
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }
}
