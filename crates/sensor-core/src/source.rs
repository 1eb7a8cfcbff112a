//! Frame source abstraction

use crate::{Sample, SourceError};

/// Interface a recording pipeline needs from a physical sensor
///
/// Concrete drivers (depth cameras, tactile sensors, CSI cameras) live
/// outside this workspace. They run their own acquisition internally and
/// expose the most recent sample on demand; implementations manage their
/// own interior locking so `latest_sample` can be polled from the capture
/// thread while the driver keeps streaming.
pub trait FrameSource: Send + Sync {
    /// Start the underlying sensor stream
    fn start(&self) -> Result<(), SourceError>;

    /// Stop the underlying sensor stream
    fn stop(&self);

    /// Return the most recent sample, or `None` if no sample is ready yet
    ///
    /// A transient read failure is an `Err`; the pipeline logs it and
    /// treats the tick as empty.
    fn latest_sample(&self) -> Result<Option<Sample>, SourceError>;
}
