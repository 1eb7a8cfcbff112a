//! Sensor pipeline implementation

use crate::{FrameRecord, PipelineError, RecordingStats, SensorManifest};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use sensor_core::{wall_clock_secs, FrameSource, Sample, SensorDescriptor};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Bounded wait for the capture thread after the run flag clears
const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Bounded wait for the writer to drain the queue at stop
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Bounded wait for the writer thread after drain completes or is cancelled
const WRITER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Writer-side receive poll interval
const WRITER_POLL: Duration = Duration::from_millis(200);

/// Sample tagged by the capture loop, in flight between the two threads
struct QueuedSample {
    payload: Vec<u8>,
    timestamp: f64,
    hardware_seq: Option<u64>,
}

/// Atomic counters behind the `offered == persisted + dropped` invariant
#[derive(Default)]
struct Counters {
    offered: AtomicU64,
    persisted: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RecordingStats {
        RecordingStats {
            offered: self.offered.load(Ordering::SeqCst),
            persisted: self.persisted.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

enum OfferOutcome {
    Queued,
    Dropped,
    Disconnected,
}

/// Count a sample as offered and push it without blocking
///
/// A full queue drops the sample; a disconnected queue (writer gone)
/// also counts it as dropped so the accounting identity keeps holding.
fn offer(counters: &Counters, tx: &Sender<QueuedSample>, sample: QueuedSample) -> OfferOutcome {
    counters.offered.fetch_add(1, Ordering::SeqCst);
    match tx.try_send(sample) {
        Ok(()) => OfferOutcome::Queued,
        Err(TrySendError::Full(_)) => {
            counters.dropped.fetch_add(1, Ordering::SeqCst);
            OfferOutcome::Dropped
        }
        Err(TrySendError::Disconnected(_)) => {
            counters.dropped.fetch_add(1, Ordering::SeqCst);
            OfferOutcome::Disconnected
        }
    }
}

/// State shared between the pipeline handle and its two worker threads
struct Shared {
    running: AtomicBool,
    cancel_drain: AtomicBool,
    capture_done: AtomicBool,
    writer_done: AtomicBool,
    counters: Counters,
    /// Last captured sample for live preview; its lock is distinct from
    /// the recording queue so preview reads never stall the writer.
    preview: Mutex<Option<Sample>>,
    manifest: Mutex<Vec<FrameRecord>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel_drain: AtomicBool::new(false),
            capture_done: AtomicBool::new(false),
            writer_done: AtomicBool::new(false),
            counters: Counters::default(),
            preview: Mutex::new(None),
            manifest: Mutex::new(Vec::new()),
        }
    }
}

/// Recording pipeline for one physical sensor
///
/// Owns a capture thread polling the frame source at the descriptor's
/// target rate and a writer thread persisting samples into the sensor's
/// session subdirectory. Not reused across sessions.
pub struct SensorPipeline {
    sensor_id: String,
    source: Arc<dyn FrameSource>,
    descriptor: SensorDescriptor,
    sensor_dir: PathBuf,
    queue_capacity: usize,
    shared: Arc<Shared>,
    capture_handle: Option<JoinHandle<()>>,
    writer_handle: Option<JoinHandle<()>>,
}

impl SensorPipeline {
    /// Create a pipeline recording into `<session_dir>/<sensor_id>/`
    pub fn new(
        sensor_id: impl Into<String>,
        source: Arc<dyn FrameSource>,
        descriptor: SensorDescriptor,
        session_dir: &Path,
        queue_capacity: usize,
    ) -> Self {
        let sensor_id = sensor_id.into();
        let sensor_dir = session_dir.join(&sensor_id);
        Self {
            sensor_id,
            source,
            descriptor,
            sensor_dir,
            queue_capacity,
            shared: Arc::new(Shared::new()),
            capture_handle: None,
            writer_handle: None,
        }
    }

    /// Start the source and spawn both worker threads
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(PipelineError::AlreadyRunning(self.sensor_id.clone()));
        }

        // Descriptors come from callers, not the validated config; a
        // non-positive rate would make the capture interval panic.
        if !(self.descriptor.target_rate_hz > 0.0) {
            return Err(PipelineError::InvalidRate {
                sensor_id: self.sensor_id.clone(),
                rate_hz: self.descriptor.target_rate_hz,
            });
        }

        self.source
            .start()
            .map_err(|e| PipelineError::SourceUnavailable {
                sensor_id: self.sensor_id.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = fs::create_dir_all(&self.sensor_dir) {
            self.source.stop();
            return Err(PipelineError::SinkInit {
                sensor_id: self.sensor_id.clone(),
                reason: e.to_string(),
            });
        }

        self.shared.cancel_drain.store(false, Ordering::SeqCst);
        self.shared.capture_done.store(false, Ordering::SeqCst);
        self.shared.writer_done.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        let (tx, rx) = bounded::<QueuedSample>(self.queue_capacity);

        let shared = self.shared.clone();
        let source = self.source.clone();
        let id = self.sensor_id.clone();
        let rate = self.descriptor.target_rate_hz;
        self.capture_handle = Some(thread::spawn(move || {
            capture_loop(&shared, source.as_ref(), &id, rate, tx);
        }));

        let shared = self.shared.clone();
        let id = self.sensor_id.clone();
        let dir = self.sensor_dir.clone();
        let extension = self.descriptor.format.extension();
        self.writer_handle = Some(thread::spawn(move || {
            writer_loop(&shared, rx, &id, &dir, extension);
        }));

        info!(
            "Started pipeline '{}' at {} Hz (queue capacity {})",
            self.sensor_id, rate, self.queue_capacity
        );
        Ok(())
    }

    /// Stop the pipeline, draining the queue within a bounded timeout
    ///
    /// Join timeouts and drain timeouts are warnings, not failures; the
    /// accounting identity is preserved by counting any discarded
    /// backlog as dropped. The per-sensor manifest is written last.
    pub fn stop(&mut self) -> Result<RecordingStats, PipelineError> {
        if self.capture_handle.is_none() && self.writer_handle.is_none() {
            return Err(PipelineError::NotRunning(self.sensor_id.clone()));
        }

        self.shared.running.store(false, Ordering::SeqCst);
        self.source.stop();

        if let Some(handle) = self.capture_handle.take() {
            if wait_for(&self.shared.capture_done, CAPTURE_JOIN_TIMEOUT) {
                let _ = handle.join();
            } else {
                warn!(
                    "Capture thread for '{}' did not stop within {:?}",
                    self.sensor_id, CAPTURE_JOIN_TIMEOUT
                );
            }
        }

        // Let the writer drain what the capture loop already queued.
        let drain_start = Instant::now();
        let mut last_progress = Instant::now();
        loop {
            let in_flight = self.shared.counters.snapshot().in_flight();
            if in_flight == 0 {
                break;
            }
            if drain_start.elapsed() >= DRAIN_TIMEOUT {
                warn!(
                    "Drain timeout for '{}': discarding {} queued samples",
                    self.sensor_id, in_flight
                );
                self.shared.cancel_drain.store(true, Ordering::SeqCst);
                break;
            }
            if last_progress.elapsed() >= Duration::from_secs(1) {
                info!("Draining '{}': {} samples remaining", self.sensor_id, in_flight);
                last_progress = Instant::now();
            }
            thread::sleep(Duration::from_millis(50));
        }

        if let Some(handle) = self.writer_handle.take() {
            if wait_for(&self.shared.writer_done, WRITER_JOIN_TIMEOUT) {
                let _ = handle.join();
            } else {
                warn!(
                    "Writer thread for '{}' did not stop within {:?}",
                    self.sensor_id, WRITER_JOIN_TIMEOUT
                );
            }
        }

        self.write_manifest()?;

        let stats = self.stats();
        info!(
            "Stopped pipeline '{}': {} persisted, {} dropped of {} offered",
            self.sensor_id, stats.persisted, stats.dropped, stats.offered
        );
        Ok(stats)
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> RecordingStats {
        self.shared.counters.snapshot()
    }

    /// Most recent captured sample, for live preview paths
    pub fn preview(&self) -> Option<Sample> {
        self.shared.preview.lock().ok().and_then(|p| p.clone())
    }

    /// Capture timestamps of all persisted frames, in write order
    pub fn frame_timestamps(&self) -> Vec<f64> {
        self.shared
            .manifest
            .lock()
            .map(|m| m.iter().map(|r| r.timestamp).collect())
            .unwrap_or_default()
    }

    /// Sensor identifier
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Static sensor metadata
    pub fn descriptor(&self) -> &SensorDescriptor {
        &self.descriptor
    }

    /// Whether the capture loop is currently running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    fn write_manifest(&self) -> Result<(), PipelineError> {
        let records = self
            .shared
            .manifest
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default();
        let stats = self.stats();
        let manifest = SensorManifest {
            sensor_id: self.sensor_id.clone(),
            target_rate_hz: self.descriptor.target_rate_hz,
            extension: self.descriptor.format.extension().to_string(),
            records,
            offered: stats.offered,
            persisted: stats.persisted,
            dropped: stats.dropped,
        };

        let path = self
            .sensor_dir
            .join(format!("{}_manifest.json", self.sensor_id));
        fs::create_dir_all(&self.sensor_dir).map_err(|e| PipelineError::Manifest {
            sensor_id: self.sensor_id.clone(),
            reason: e.to_string(),
        })?;
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| PipelineError::Manifest {
            sensor_id: self.sensor_id.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| PipelineError::Manifest {
            sensor_id: self.sensor_id.clone(),
            reason: e.to_string(),
        })?;
        debug!("Wrote manifest for '{}' to {}", self.sensor_id, path.display());
        Ok(())
    }
}

/// Poll a completion flag until set or the timeout elapses
fn wait_for(flag: &AtomicBool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    flag.load(Ordering::SeqCst)
}

/// Capture loop: poll the source at the target rate, never block on the queue
fn capture_loop(
    shared: &Shared,
    source: &dyn FrameSource,
    sensor_id: &str,
    rate_hz: f64,
    tx: Sender<QueuedSample>,
) {
    debug!("Capture loop started for '{}'", sensor_id);
    let interval = Duration::from_secs_f64(1.0 / rate_hz);
    let mut last_tick = Instant::now();
    let mut last_hw_seq: Option<u64> = None;

    while shared.running.load(Ordering::SeqCst) {
        match source.latest_sample() {
            Ok(Some(sample)) => {
                // Drivers that stamp frames let us skip re-reads of the
                // same frame between sensor updates.
                let duplicate = sample.hardware_seq.is_some() && sample.hardware_seq == last_hw_seq;
                if !duplicate {
                    last_hw_seq = sample.hardware_seq;
                    if let Ok(mut preview) = shared.preview.lock() {
                        *preview = Some(sample.clone());
                    }
                    let queued = QueuedSample {
                        timestamp: wall_clock_secs(),
                        hardware_seq: sample.hardware_seq,
                        payload: sample.payload,
                    };
                    if let OfferOutcome::Disconnected = offer(&shared.counters, &tx, queued) {
                        warn!("Writer for '{}' is gone, stopping capture", sensor_id);
                        break;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Sample read failed for '{}': {}", sensor_id, e);
            }
        }

        // Self-correcting cadence: sleep only the residual of the interval.
        let elapsed = last_tick.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
        last_tick = Instant::now();
    }

    shared.capture_done.store(true, Ordering::SeqCst);
    debug!("Capture loop ended for '{}'", sensor_id);
}

/// Writer loop: pull with a timeout and persist under sequential names
fn writer_loop(
    shared: &Shared,
    rx: Receiver<QueuedSample>,
    sensor_id: &str,
    sensor_dir: &Path,
    extension: &str,
) {
    debug!("Writer loop started for '{}'", sensor_id);
    let mut sequence: u64 = 0;

    loop {
        if shared.cancel_drain.load(Ordering::SeqCst) {
            let mut discarded: u64 = 0;
            while rx.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                shared.counters.dropped.fetch_add(discarded, Ordering::SeqCst);
                warn!("Discarded {} undrained samples for '{}'", discarded, sensor_id);
            }
            break;
        }

        match rx.recv_timeout(WRITER_POLL) {
            Ok(item) => {
                let filename = format!("frame_{:06}.{}", sequence, extension);
                match fs::write(sensor_dir.join(&filename), &item.payload) {
                    Ok(()) => {
                        if let Ok(mut manifest) = shared.manifest.lock() {
                            manifest.push(FrameRecord {
                                sequence,
                                timestamp: item.timestamp,
                                hardware_seq: item.hardware_seq,
                                filename,
                            });
                        }
                        sequence += 1;
                        let persisted =
                            shared.counters.persisted.fetch_add(1, Ordering::SeqCst) + 1;
                        if persisted % 100 == 0 {
                            debug!("'{}' persisted {} frames", sensor_id, persisted);
                        }
                    }
                    Err(e) => {
                        // Sink failure is fatal to this pipeline only: stop
                        // the capture side and keep counting what we cannot
                        // persist so the accounting identity holds.
                        error!("Sink write failed for '{}': {}", sensor_id, e);
                        shared.counters.dropped.fetch_add(1, Ordering::SeqCst);
                        shared.running.store(false, Ordering::SeqCst);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.writer_done.store(true, Ordering::SeqCst);
    let stats = shared.counters.snapshot();
    debug!(
        "Writer loop ended for '{}': {} persisted, {} dropped",
        sensor_id, stats.persisted, stats.dropped
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::{StorageFormat, SyntheticSource};

    fn test_descriptor(rate_hz: f64) -> SensorDescriptor {
        SensorDescriptor {
            name: "test".to_string(),
            target_rate_hz: rate_hz,
            resolution: None,
            format: StorageFormat::Raw,
        }
    }

    #[test]
    fn test_backpressure_accounting() {
        // 1000 samples offered into a capacity-300 queue with a stalled
        // consumer: exactly 700 dropped, 300 in flight. Draining the
        // queue afterwards closes the identity.
        let counters = Counters::default();
        let (tx, rx) = bounded::<QueuedSample>(300);

        for i in 0..1000u64 {
            let sample = QueuedSample {
                payload: vec![0u8; 4],
                timestamp: i as f64,
                hardware_seq: Some(i),
            };
            offer(&counters, &tx, sample);
        }

        let stats = counters.snapshot();
        assert_eq!(stats.offered, 1000);
        assert_eq!(stats.dropped, 700);
        assert_eq!(stats.in_flight(), 300);

        let mut drained = 0u64;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        counters.persisted.fetch_add(drained, Ordering::SeqCst);

        let stats = counters.snapshot();
        assert_eq!(stats.persisted, 300);
        assert_eq!(stats.offered, stats.persisted + stats.dropped);
    }

    proptest::proptest! {
        #[test]
        fn prop_accounting_identity_under_interleaving(
            ops in proptest::collection::vec(proptest::bool::ANY, 1..200),
        ) {
            // true offers a sample, false drains one; the identity must
            // hold at every point and close once the queue is empty.
            let counters = Counters::default();
            let (tx, rx) = bounded::<QueuedSample>(8);

            for (i, op) in ops.into_iter().enumerate() {
                if op {
                    let sample = QueuedSample {
                        payload: vec![],
                        timestamp: i as f64,
                        hardware_seq: None,
                    };
                    offer(&counters, &tx, sample);
                } else if rx.try_recv().is_ok() {
                    counters.persisted.fetch_add(1, Ordering::SeqCst);
                }
                let stats = counters.snapshot();
                proptest::prop_assert_eq!(stats.offered, stats.persisted + stats.dropped + stats.in_flight());
            }

            while rx.try_recv().is_ok() {
                counters.persisted.fetch_add(1, Ordering::SeqCst);
            }
            let stats = counters.snapshot();
            proptest::prop_assert_eq!(stats.offered, stats.persisted + stats.dropped);
            proptest::prop_assert_eq!(stats.in_flight(), 0);
        }
    }

    #[test]
    fn test_offer_counts_disconnected_as_dropped() {
        let counters = Counters::default();
        let (tx, rx) = bounded::<QueuedSample>(4);
        drop(rx);

        let sample = QueuedSample {
            payload: vec![],
            timestamp: 0.0,
            hardware_seq: None,
        };
        assert!(matches!(
            offer(&counters, &tx, sample),
            OfferOutcome::Disconnected
        ));
        let stats = counters.snapshot();
        assert_eq!(stats.offered, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.in_flight(), 0);
    }

    #[test]
    fn test_pipeline_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(SyntheticSource::new(32));
        let mut pipeline = SensorPipeline::new(
            "vt_1",
            source,
            test_descriptor(200.0),
            dir.path(),
            64,
        );

        pipeline.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        let stats = pipeline.stop().unwrap();

        assert!(stats.persisted > 0);
        assert_eq!(stats.offered, stats.persisted + stats.dropped);

        let manifest_path = dir.path().join("vt_1").join("vt_1_manifest.json");
        let manifest: SensorManifest =
            serde_json::from_slice(&fs::read(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest.persisted, stats.persisted);
        assert_eq!(manifest.records.len() as u64, stats.persisted);

        // Sequence numbers are 0-based, contiguous, strictly increasing,
        // and timestamps arrive in order.
        for (i, record) in manifest.records.iter().enumerate() {
            assert_eq!(record.sequence, i as u64);
            assert!(dir.path().join("vt_1").join(&record.filename).exists());
            if i > 0 {
                assert!(record.timestamp >= manifest.records[i - 1].timestamp);
            }
        }
    }

    #[test]
    fn test_preview_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(SyntheticSource::new(8));
        let mut pipeline =
            SensorPipeline::new("cam", source, test_descriptor(100.0), dir.path(), 16);

        assert!(pipeline.preview().is_none());
        pipeline.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(pipeline.preview().is_some());
        pipeline.stop().unwrap();
    }

    #[test]
    fn test_failing_source_aborts_start() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(SyntheticSource::failing());
        let mut pipeline =
            SensorPipeline::new("bad", source, test_descriptor(30.0), dir.path(), 16);

        match pipeline.start() {
            Err(PipelineError::SourceUnavailable { sensor_id, .. }) => {
                assert_eq!(sensor_id, "bad");
            }
            other => panic!("expected SourceUnavailable, got {:?}", other.err()),
        }
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_non_positive_rate_rejected_at_start() {
        let dir = tempfile::tempdir().unwrap();

        for rate in [0.0, -30.0, f64::NAN] {
            let source = Arc::new(SyntheticSource::new(8));
            let mut pipeline =
                SensorPipeline::new("norate", source, test_descriptor(rate), dir.path(), 16);
            assert!(matches!(
                pipeline.start(),
                Err(PipelineError::InvalidRate { .. })
            ));
            assert!(!pipeline.is_running());
        }
    }

    #[test]
    fn test_stop_without_start() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(SyntheticSource::new(8));
        let mut pipeline =
            SensorPipeline::new("idle", source, test_descriptor(30.0), dir.path(), 16);
        assert!(matches!(pipeline.stop(), Err(PipelineError::NotRunning(_))));
    }

    #[test]
    fn test_sink_failure_mid_session_keeps_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(SyntheticSource::new(8));
        let mut pipeline =
            SensorPipeline::new("flaky", source, test_descriptor(200.0), dir.path(), 32);

        pipeline.start().unwrap();
        thread::sleep(Duration::from_millis(100));

        // Yank the sink out from under the writer.
        fs::remove_dir_all(dir.path().join("flaky")).unwrap();
        thread::sleep(Duration::from_millis(300));

        // The writer stopped the pipeline on its own; failed writes are
        // counted as drops.
        assert!(!pipeline.is_running());
        let result = pipeline.stop();
        let stats = match result {
            Ok(stats) => stats,
            Err(_) => pipeline.stats(),
        };
        assert!(stats.dropped > 0);
        assert_eq!(stats.offered, stats.persisted + stats.dropped);
    }
}
