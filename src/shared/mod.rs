//! Shared state and messaging between the monitor and its caller
//!
//! The monitor's worker threads publish [`MonitorEvent`]s and update a
//! [`RuntimeState`] that any driver (CLI or UI) can read.

pub mod state;
pub mod messages;

pub use state::{MonitorState, RuntimeState};
pub use messages::{MonitorEvent, StopReason};
