//! Session archive accumulation, alignment, and persistence

use crate::{ArchiveError, DetectionSummary, DistanceSample, SessionMetadata};
use crate::metadata::DetectionSetup;
use chrono::Utc;
use sensor_core::{DetectionResult, SensorDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Current archive schema version
pub const ARCHIVE_VERSION: u32 = 1;

/// Archive filename within the session directory
const ARCHIVE_FILENAME: &str = "session_archive.bin";
/// Inspection sidecar filename
const SIDECAR_FILENAME: &str = "session_metadata.json";

/// A secondary stream aligned against the reference timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignedStream {
    /// The stream's own capture timestamps, in arrival order
    pub timestamps: Vec<f64>,
    /// Reference-frame index each sample maps to; computed once at
    /// finalize, never mutated afterwards
    pub aligned_indices: Vec<u64>,
    /// Number of samples in the stream
    pub frame_count: u64,
}

/// On-disk archive layout (postcard-encoded)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveFile {
    /// Schema version, first field so readers can bail early
    pub version: u32,
    /// Session metadata
    pub metadata: SessionMetadata,
    /// Reference timeline: the session's time axis
    pub reference_timestamps: Vec<f64>,
    /// Hardware sequence number per reference frame, where available
    pub reference_hardware_seqs: Vec<Option<u64>>,
    /// One distance sample per reference frame
    pub distance_samples: Vec<DistanceSample>,
    /// Summary statistics over the distance samples
    pub summary: Option<DetectionSummary>,
    /// Secondary streams by sensor id
    pub streams: BTreeMap<String, AlignedStream>,
}

/// Map each secondary timestamp to the first reference sample not
/// earlier than it
///
/// For each `s`, the result is the smallest `j` with `reference[j] >= s`,
/// clamped to the last index when `s` exceeds the whole timeline. This is
/// deliberately not a nearest-neighbor mapping: downstream consumers
/// depend on the forward-search behavior, so `s` closer to
/// `reference[j-1]` still maps to `j`.
pub fn align_to_reference(secondary: &[f64], reference: &[f64]) -> Vec<u64> {
    if reference.is_empty() {
        return Vec::new();
    }
    let last = reference.len() - 1;
    secondary
        .iter()
        .map(|&s| {
            let j = reference.partition_point(|&t| t < s);
            j.min(last) as u64
        })
        .collect()
}

/// Accumulates one session's aligned data and seals it at finalize
pub struct SessionArchive {
    session_dir: PathBuf,
    metadata: SessionMetadata,
    reference_timestamps: Vec<f64>,
    reference_hardware_seqs: Vec<Option<u64>>,
    distance_samples: Vec<DistanceSample>,
    secondary_streams: BTreeMap<String, Vec<f64>>,
    recording: bool,
    start_instant: Option<Instant>,
    finalized: bool,
}

impl SessionArchive {
    /// Create an empty archive for a session directory
    pub fn new(session_dir: impl Into<PathBuf>, session_name: impl Into<String>) -> Self {
        Self {
            session_dir: session_dir.into(),
            metadata: SessionMetadata::new(session_name),
            reference_timestamps: Vec::new(),
            reference_hardware_seqs: Vec::new(),
            distance_samples: Vec::new(),
            secondary_streams: BTreeMap::new(),
            recording: false,
            start_instant: None,
            finalized: false,
        }
    }

    /// Open the recording window and capture the start time
    pub fn start_recording(&mut self) {
        self.recording = true;
        if self.metadata.start_time.is_none() {
            self.metadata.start_time = Some(Utc::now());
            self.start_instant = Some(Instant::now());
        }
        info!("Archive recording window opened for '{}'", self.metadata.session_name);
    }

    /// Roll back a recording window that never produced a session
    ///
    /// Used when the orchestrator's start fails partway: the window
    /// closes and the start time is cleared so a later successful start
    /// still sets it exactly once.
    pub fn cancel(&mut self) {
        self.recording = false;
        self.metadata.start_time = None;
        self.start_instant = None;
        debug!("Archive recording window cancelled");
    }

    /// Close the recording window and capture end time and duration
    pub fn stop_recording(&mut self) {
        self.recording = false;
        if self.metadata.start_time.is_some() && self.metadata.end_time.is_none() {
            self.metadata.end_time = Some(Utc::now());
            if let Some(start) = self.start_instant {
                self.metadata.duration_secs = start.elapsed().as_secs_f64();
            }
        }
        info!(
            "Archive recording window closed after {:.1}s, {} reference frames",
            self.metadata.duration_secs,
            self.reference_timestamps.len()
        );
    }

    /// Whether the recording window is open
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Append one reference frame to the session time axis
    ///
    /// Ignored while the recording window is closed. The timeline is
    /// assumed non-decreasing; an out-of-order arrival is logged but
    /// kept, since rejecting it would desynchronize the distance
    /// samples from the video frames already persisted.
    pub fn record_reference_frame(&mut self, timestamp: f64, result: Option<&DetectionResult>) {
        if !self.recording {
            return;
        }
        if let Some(&last) = self.reference_timestamps.last() {
            if timestamp < last {
                warn!(
                    "Reference timestamp went backwards: {} after {}",
                    timestamp, last
                );
            }
        }
        self.reference_timestamps.push(timestamp);
        self.reference_hardware_seqs
            .push(result.and_then(|r| r.hardware_seq));
        self.distance_samples.push(match result {
            Some(r) => DistanceSample::from_detection(r),
            None => DistanceSample::missing(),
        });
    }

    /// Register a sensor's static metadata
    pub fn register_sensor_metadata(&mut self, sensor_id: impl Into<String>, descriptor: SensorDescriptor) {
        let sensor_id = sensor_id.into();
        debug!("Registered sensor metadata for '{}'", sensor_id);
        self.metadata.sensors.insert(sensor_id, descriptor);
    }

    /// Record the marker detection setup
    pub fn set_detection_setup(&mut self, setup: DetectionSetup) {
        self.metadata.detection = setup;
    }

    /// Register a secondary stream's own capture timestamps for alignment
    pub fn add_secondary_timestamps(&mut self, sensor_id: impl Into<String>, timestamps: Vec<f64>) {
        let sensor_id = sensor_id.into();
        debug!(
            "Registered {} secondary timestamps for '{}'",
            timestamps.len(),
            sensor_id
        );
        self.secondary_streams.insert(sensor_id, timestamps);
    }

    /// Number of reference frames recorded so far
    pub fn frame_count(&self) -> usize {
        self.reference_timestamps.len()
    }

    /// Seal the session: compute alignments and statistics, write the
    /// archive and its JSON sidecar, and return the archive path
    ///
    /// Succeeds with zero frames and with absent sensor sections so a
    /// session directory always ends up with an inspectable artifact.
    /// Sidecar failure is a warning; only the archive itself is fatal.
    pub fn finalize(&mut self) -> Result<PathBuf, ArchiveError> {
        if self.finalized {
            return Err(ArchiveError::AlreadyFinalized);
        }

        let streams: BTreeMap<String, AlignedStream> = self
            .secondary_streams
            .iter()
            .map(|(id, timestamps)| {
                let aligned_indices = align_to_reference(timestamps, &self.reference_timestamps);
                (
                    id.clone(),
                    AlignedStream {
                        frame_count: timestamps.len() as u64,
                        timestamps: timestamps.clone(),
                        aligned_indices,
                    },
                )
            })
            .collect();

        let file = ArchiveFile {
            version: ARCHIVE_VERSION,
            metadata: self.metadata.clone(),
            reference_timestamps: self.reference_timestamps.clone(),
            reference_hardware_seqs: self.reference_hardware_seqs.clone(),
            distance_samples: self.distance_samples.clone(),
            summary: DetectionSummary::compute(&self.distance_samples),
            streams,
        };

        fs::create_dir_all(&self.session_dir)?;
        let encoded =
            postcard::to_allocvec(&file).map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        let archive_path = self.session_dir.join(ARCHIVE_FILENAME);
        fs::write(&archive_path, encoded)?;
        self.finalized = true;

        // The sidecar is a convenience copy; losing it is not fatal.
        match serde_json::to_vec_pretty(&file.metadata) {
            Ok(json) => {
                if let Err(e) = fs::write(self.session_dir.join(SIDECAR_FILENAME), json) {
                    warn!("Failed to write metadata sidecar: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize metadata sidecar: {}", e),
        }

        info!(
            "Finalized session archive: {} ({} reference frames, {} secondary streams)",
            archive_path.display(),
            file.reference_timestamps.len(),
            file.streams.len()
        );
        Ok(archive_path)
    }
}

/// Load a finalized archive for inspection
pub fn load_archive(path: &Path) -> Result<ArchiveFile, ArchiveError> {
    let bytes = fs::read(path)?;
    let file: ArchiveFile =
        postcard::from_bytes(&bytes).map_err(|e| ArchiveError::Serialization(e.to_string()))?;
    if file.version != ARCHIVE_VERSION {
        return Err(ArchiveError::UnsupportedVersion(file.version));
    }
    Ok(file)
}
