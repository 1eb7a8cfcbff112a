//! Session Orchestrator
//!
//! Coordinates a recording session across all registered sensor
//! pipelines and the session archive: all-or-nothing start with
//! rollback, best-effort stop that always finalizes the archive, and
//! reference-frame fan-in while the session runs.

mod session;

pub use session::{SessionOrchestrator, SessionResult};

use capture_pipeline::PipelineError;
use session_archive::ArchiveError;
use thiserror::Error;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No sensors registered")]
    NoSensors,

    #[error("Session is already recording")]
    AlreadyRecording,

    #[error("Session is not recording")]
    NotRecording,

    #[error("Sensor '{0}' is already registered")]
    DuplicateSensor(String),

    #[error("Cannot register sensors while recording")]
    RegisterWhileRecording,

    #[error("Failed to create session directory: {0}")]
    SessionDir(#[from] std::io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
