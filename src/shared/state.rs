//! Runtime state shared between the monitor threads and the caller

/// Lifecycle of the monitor's watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    Watching,
}

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Whether the watch loop is running
    pub state: MonitorState,
    /// Source being watched
    pub source_url: Option<String>,
    /// Word of the alarm currently asserted
    pub alarm_word: Option<String>,
    /// Frames pulled from the source since watching started
    pub frames_processed: u64,
    /// Frames skipped because preprocessing or OCR failed
    pub frames_failed: u64,
    /// Whether a recording session is open
    pub recording: bool,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeState {
    pub fn is_watching(&self) -> bool {
        self.state == MonitorState::Watching
    }

    pub fn is_alarmed(&self) -> bool {
        self.alarm_word.is_some()
    }

    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}
