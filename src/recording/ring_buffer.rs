use std::collections::VecDeque;

use crate::capture::Frame;

/// Rolling window of the most recent frames.
///
/// Holds at most `capacity` frames (pre-alarm seconds x fps, never below one).
/// When full, the oldest frame is evicted to make room for the newest. The
/// window is not drained by a recording: it keeps filling across sessions so a
/// pre-alarm window is ready the moment an alarm fires.
pub struct FrameRing {
    frames: VecDeque<Frame>,
    capacity: usize,
    /// Frames pushed over the ring's lifetime; the newest frame's sequence number
    pushed: u64,
}

/// Frames allocated up front; larger windows grow as frames arrive
const PREALLOCATED_FRAMES: usize = 256;

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity.min(PREALLOCATED_FRAMES)),
            capacity,
            pushed: 0,
        }
    }

    /// Pushes a frame, evicting the oldest if the ring is at capacity.
    /// Returns the frame's sequence number (1 for the first frame ever pushed).
    pub fn push(&mut self, frame: Frame) -> u64 {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        self.pushed += 1;
        self.pushed
    }

    /// Copies of every buffered frame, oldest first.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.iter().cloned().collect()
    }

    /// Sequence number of the newest frame, 0 if nothing was ever pushed
    pub fn last_sequence(&self) -> u64 {
        self.pushed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Changes the capacity; the oldest frames are dropped if it shrinks
    /// below the current fill level.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }
}
