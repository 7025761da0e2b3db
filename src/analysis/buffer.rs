//! Bounded store of recognized text
//!
//! Keeps the most recent OCR detections in arrival order. Once full, every
//! new entry evicts the oldest one.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;

/// Default number of detections kept
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// One timestamped unit of recognized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    text: String,
    timestamp: DateTime<Local>,
}

impl Detection {
    /// Create a detection from raw OCR output; blank text yields `None`
    pub fn new(text: &str, timestamp: DateTime<Local>) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            timestamp,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Timestamp with millisecond precision, as used in logs and displays
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.formatted_timestamp(), self.text)
    }
}

/// Insertion-ordered detections with a fixed capacity
#[derive(Debug, Clone)]
pub struct DetectionBuffer {
    entries: VecDeque<Detection>,
    capacity: usize,
}

impl Default for DetectionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl DetectionBuffer {
    /// Create an empty buffer; a capacity of 0 is raised to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record OCR text, stamped now unless a timestamp is given
    ///
    /// Blank text is ignored. Returns the stored detection.
    pub fn append(&mut self, text: &str, timestamp: Option<DateTime<Local>>) -> Option<Detection> {
        let detection = Detection::new(text, timestamp.unwrap_or_else(Local::now))?;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(detection.clone());
        Some(detection)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The last `k` detections, oldest first
    pub fn recent(&self, k: usize) -> Vec<Detection> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// All detections, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, dropping the oldest entries if it shrinks
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}
