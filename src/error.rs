//! Error types surfaced at the core's boundaries

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the alarm monitor to its caller
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid source URL '{0}': expected an http://, https:// or rtsp:// address")]
    InvalidSourceUrl(String),

    #[error("Camera source '{url}' is unavailable: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("Already watching a camera source")]
    AlreadyWatching,
}

/// Errors raised when a recording session cannot be opened
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Failed to create recording {path:?}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unsupported recording format '{0}'")]
    UnsupportedFormat(String),
}

/// Errors raised for frames whose pixel buffer does not match their geometry
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame buffer holds {actual} bytes, expected {expected} for {width}x{height}x{channels}")]
    BufferSize {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported channel count {0}")]
    Channels(u8),
}
