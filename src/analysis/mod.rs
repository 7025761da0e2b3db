//! Text Analysis Layer
//!
//! Buffers recognized text and checks it against the configured watch words.

pub mod buffer;
pub mod rules;

pub use buffer::{Detection, DetectionBuffer};
pub use rules::{find_alarm, WatchWordInput, WatchWords};
