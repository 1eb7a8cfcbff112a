//! Synthetic frame source for tests and headless runs

use crate::{FrameSource, Sample, SourceError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Frame source that fabricates payloads on every poll
///
/// Each `latest_sample` call yields a fresh hardware sequence number, so
/// a pipeline polling it never sees duplicate frames. Used by the CLI
/// session runner and by pipeline tests; real drivers implement
/// [`FrameSource`] outside this workspace.
pub struct SyntheticSource {
    running: AtomicBool,
    counter: AtomicU64,
    payload_len: usize,
    fail_start: bool,
}

impl SyntheticSource {
    /// Create a source producing payloads of `payload_len` bytes
    pub fn new(payload_len: usize) -> Self {
        Self {
            running: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            payload_len,
            fail_start: false,
        }
    }

    /// Create a source whose `start` always fails, for rollback tests
    pub fn failing() -> Self {
        Self {
            running: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            payload_len: 0,
            fail_start: true,
        }
    }

    /// Number of samples handed out so far
    pub fn samples_produced(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl FrameSource for SyntheticSource {
    fn start(&self) -> Result<(), SourceError> {
        if self.fail_start {
            return Err(SourceError::Unavailable(
                "synthetic source configured to fail".to_string(),
            ));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn latest_sample(&self) -> Result<Option<Sample>, SourceError> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let payload = vec![(seq & 0xff) as u8; self.payload_len];
        Ok(Some(Sample::with_hardware_seq(payload, seq)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_fresh_sequence_numbers() {
        let src = SyntheticSource::new(16);
        assert!(src.latest_sample().unwrap().is_none());

        src.start().unwrap();
        let a = src.latest_sample().unwrap().unwrap();
        let b = src.latest_sample().unwrap().unwrap();
        assert_ne!(a.hardware_seq, b.hardware_seq);
        assert_eq!(a.payload.len(), 16);

        src.stop();
        assert!(src.latest_sample().unwrap().is_none());
    }

    #[test]
    fn test_failing_source() {
        let src = SyntheticSource::failing();
        assert!(src.start().is_err());
    }
}
