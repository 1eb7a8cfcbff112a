//! Session Archive
//!
//! Accumulates the reference sensor's timestamps as the session time
//! axis, keeps one distance sample per reference frame, aligns secondary
//! streams against the axis at finalize, and persists the whole session
//! as one immutable, versioned binary artifact plus a JSON metadata
//! sidecar for quick inspection.

mod archive;
mod distance;
mod metadata;

pub use archive::{
    align_to_reference, load_archive, ArchiveFile, AlignedStream, SessionArchive, ARCHIVE_VERSION,
};
pub use distance::{DetectionSummary, DistanceSample};
pub use metadata::{DetectionSetup, SessionMetadata};

use thiserror::Error;

/// Archive error types
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive serialization failed: {0}")]
    Serialization(String),

    #[error("Archive already finalized")]
    AlreadyFinalized,

    #[error("Unsupported archive version {0}")]
    UnsupportedVersion(u32),
}
