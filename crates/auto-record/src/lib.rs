//! Auto-Record Controller
//!
//! Watches the per-frame marker distance and drives recording start and
//! stop through a hysteresis state machine: arm when the markers come
//! close, start after the closeness proves stable, stop when they
//! separate past a wider threshold, then hold a cooldown before
//! re-arming.

mod controller;

pub use controller::{AutoRecordConfig, AutoRecordController, StateInfo};

use std::fmt;

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRecordState {
    /// Controller is off; frames are ignored
    Disabled,
    /// Waiting for the markers to come within the start threshold
    Idle,
    /// Close distance seen, counting stable frames before starting
    Armed,
    /// Recording is active until the stop threshold is exceeded
    Recording,
    /// Quiet period after a stop, no re-arming yet
    Cooldown,
}

impl fmt::Display for AutoRecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AutoRecordState::Disabled => "DISABLED",
            AutoRecordState::Idle => "IDLE",
            AutoRecordState::Armed => "ARMED",
            AutoRecordState::Recording => "RECORDING",
            AutoRecordState::Cooldown => "COOLDOWN",
        };
        f.write_str(s)
    }
}

/// Recording actions the controller can trigger
///
/// The controller never owns the session; it asks whoever does. Errors
/// are surfaced so the state machine can hold its position instead of
/// assuming the action happened.
pub trait RecordingControl {
    /// Begin a recording session
    fn start_recording(&mut self) -> anyhow::Result<()>;
    /// End the active recording session
    fn stop_recording(&mut self) -> anyhow::Result<()>;
}
