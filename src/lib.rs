//! OCR Alarm - watches a camera stream for watch words
//!
//! Frames are preprocessed and passed to an OCR engine, recognized text is
//! kept in a bounded buffer, and a fixed-cadence check raises an alarm when a
//! watch word shows up. Alarms can trigger a recording that starts with the
//! frames buffered just before the alarm.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod recording;
pub mod shared;
pub mod storage;
pub mod vision;

pub use error::{FrameError, MonitorError, RecordingError};
pub use monitor::AlarmMonitor;
