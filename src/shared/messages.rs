//! Message types sent from the monitor to its caller

use chrono::{DateTime, Local};
use std::path::PathBuf;

use crate::analysis::Detection;

/// Why the monitor left the watching state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Caller asked to stop
    Requested,
    /// The source reported end of stream
    EndOfStream,
    /// Reading from the source failed
    SourceError(String),
}

/// Events published by the monitor
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Watching started on a source
    Started { url: String },
    /// New text was recognized and buffered
    Detection(Detection),
    /// A watch word was found in the buffer
    Alarm { word: String, at: DateTime<Local> },
    /// An alarm recording was opened
    RecordingStarted { path: PathBuf },
    /// An alarm recording was closed
    RecordingStopped { path: PathBuf, frames: usize },
    /// An alarm recording could not be opened
    RecordingFailed(String),
    /// Watching ended
    Stopped { reason: StopReason },
}
