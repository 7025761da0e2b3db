//! Alarm Recording
//!
//! Keeps a rolling pre-alarm window of frames and, once started, writes that
//! window followed by live frames to a timestamped output file.

mod ring_buffer;
mod writer;

pub use ring_buffer::FrameRing;
pub use writer::{factory_for, is_already_exists, FrameSink, MjpegSink, MjpegSinkFactory, SinkFactory};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

use crate::capture::Frame;
use crate::config::RecordingConfig;
use crate::error::RecordingError;

/// Suffixes tried for alarms landing in the same second
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Result of asking the recorder to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { id: u64, path: PathBuf },
    /// A session is already open; nothing was changed
    AlreadyRecording,
}

/// What a finished session wrote
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub id: u64,
    pub path: PathBuf,
    pub frames_written: usize,
    pub started_at: DateTime<Local>,
    pub stopped_at: DateTime<Local>,
}

/// Public view of the open session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: u64,
    pub path: PathBuf,
    pub started_at: DateTime<Local>,
    pub stop_deadline: DateTime<Local>,
    pub frames_written: usize,
}

struct RecordingSession {
    id: u64,
    path: PathBuf,
    started_at: DateTime<Local>,
    stop_deadline: DateTime<Local>,
    sink: Box<dyn FrameSink>,
    frames_written: usize,
    /// Sequence number of the newest ring frame already in the file
    last_sequence: u64,
}

impl RecordingSession {
    fn write(&mut self, frame: &Frame) {
        match self.sink.write_frame(frame) {
            Ok(()) => self.frames_written += 1,
            Err(e) => warn!("Failed to write frame to {:?}: {}", self.path, e),
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            path: self.path.clone(),
            started_at: self.started_at,
            stop_deadline: self.stop_deadline,
            frames_written: self.frames_written,
        }
    }

    fn finish(self) -> RecordingSummary {
        if let Err(e) = self.sink.finish() {
            error!("Failed to close recording {:?}: {}", self.path, e);
        }
        RecordingSummary {
            id: self.id,
            path: self.path,
            frames_written: self.frames_written,
            started_at: self.started_at,
            stopped_at: Local::now(),
        }
    }
}

/// Pre/post-alarm video recorder
///
/// `add_frame` is called from the ingestion thread, `start` from the alarm
/// checker and `stop_session` from the post-alarm timer. The ring and the
/// session each have their own lock and `add_frame` never holds both.
pub struct VideoRecorder {
    settings: RecordingConfig,
    frames: Mutex<FrameRing>,
    session: Mutex<Option<RecordingSession>>,
    /// `None` when the configured format has no writer; `start` then fails
    factory: Option<Box<dyn SinkFactory>>,
    next_id: AtomicU64,
}

impl VideoRecorder {
    /// Create a recorder for the configured output format.
    ///
    /// An unsupported format only matters once a recording is requested:
    /// the recorder still buffers frames and every `start` reports
    /// [`RecordingError::UnsupportedFormat`].
    pub fn new(settings: RecordingConfig) -> Self {
        let factory = match factory_for(&settings) {
            Ok(factory) => Some(factory),
            Err(e) => {
                warn!("{}; alarm recordings will fail", e);
                None
            }
        };
        Self::build(settings, factory)
    }

    /// Create a recorder writing through a custom sink factory
    pub fn with_factory(settings: RecordingConfig, factory: Box<dyn SinkFactory>) -> Self {
        Self::build(settings, Some(factory))
    }

    fn build(settings: RecordingConfig, factory: Option<Box<dyn SinkFactory>>) -> Self {
        let capacity = settings.pre_alarm_frames();
        Self {
            settings,
            frames: Mutex::new(FrameRing::new(capacity)),
            session: Mutex::new(None),
            factory,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &RecordingConfig {
        &self.settings
    }

    /// Buffer a frame, and write it if a session is open
    pub fn add_frame(&self, frame: &Frame) {
        let sequence = self.frames.lock().push(frame.clone());

        let mut session = self.session.lock();
        if let Some(session) = session.as_mut() {
            // Frames already copied out of the ring by start() are skipped
            if sequence > session.last_sequence {
                session.write(frame);
                session.last_sequence = sequence;
            }
        }
    }

    /// Open a new recording seeded with the pre-alarm window
    pub fn start(&self) -> Result<StartOutcome, RecordingError> {
        let mut session = self.session.lock();
        if session.is_some() {
            info!("Recording already in progress, alarm ignored by recorder");
            return Ok(StartOutcome::AlreadyRecording);
        }

        let Some(factory) = self.factory.as_deref() else {
            return Err(RecordingError::UnsupportedFormat(
                self.settings.format.to_ascii_lowercase(),
            ));
        };

        let started_at = Local::now();
        let directory = &self.settings.output_directory;
        let stem = format!("alarm_recording_{}", started_at.format("%Y%m%d_%H%M%S"));

        if let Err(e) = std::fs::create_dir_all(directory) {
            return Err(RecordingError::Init {
                path: output_path(directory, &stem, 1, factory.extension()),
                source: e.into(),
            });
        }
        let (path, sink) = open_unique(factory, directory, &stem)?;

        let (pre_alarm, last_sequence) = {
            let frames = self.frames.lock();
            (frames.snapshot(), frames.last_sequence())
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stop_deadline = started_at
            + chrono::Duration::from_std(self.settings.post_alarm()).unwrap_or_else(|_| chrono::Duration::zero());
        let mut new_session = RecordingSession {
            id,
            path: path.clone(),
            started_at,
            stop_deadline,
            sink,
            frames_written: 0,
            last_sequence,
        };
        for frame in &pre_alarm {
            new_session.write(frame);
        }

        info!(
            "Recording {} started: {:?} ({} pre-alarm frames)",
            id,
            path,
            new_session.frames_written
        );
        *session = Some(new_session);

        Ok(StartOutcome::Started { id, path })
    }

    /// Close the open session, if any
    pub fn stop(&self) -> Option<RecordingSummary> {
        let session = self.session.lock().take()?;
        let summary = session.finish();
        info!(
            "Recording {} stopped: {:?} ({} frames)",
            summary.id, summary.path, summary.frames_written
        );
        Some(summary)
    }

    /// Close the session only if it is still the one with `id`
    pub fn stop_session(&self, id: u64) -> Option<RecordingSummary> {
        let session = {
            let mut current = self.session.lock();
            match current.as_ref() {
                Some(session) if session.id == id => current.take(),
                _ => None,
            }
        }?;
        let summary = session.finish();
        info!(
            "Recording {} finished after post-alarm window: {:?} ({} frames)",
            summary.id, summary.path, summary.frames_written
        );
        Some(summary)
    }

    pub fn is_recording(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn current_session(&self) -> Option<SessionInfo> {
        self.session.lock().as_ref().map(RecordingSession::info)
    }

    /// Copy of the pre-alarm window, oldest first
    pub fn buffered_frames(&self) -> Vec<Frame> {
        self.frames.lock().snapshot()
    }
}

fn output_path(directory: &Path, stem: &str, attempt: u32, extension: &str) -> PathBuf {
    if attempt <= 1 {
        directory.join(format!("{stem}.{extension}"))
    } else {
        directory.join(format!("{stem}_{attempt}.{extension}"))
    }
}

/// Opens `stem.ext`, or `stem_2.ext`, `stem_3.ext`... if taken
fn open_unique(
    factory: &dyn SinkFactory,
    directory: &Path,
    stem: &str,
) -> Result<(PathBuf, Box<dyn FrameSink>), RecordingError> {
    let mut attempt = 1;
    loop {
        let path = output_path(directory, stem, attempt, factory.extension());
        match factory.create(&path) {
            Ok(sink) => return Ok((path, sink)),
            Err(source) if is_already_exists(&source) && attempt < MAX_NAME_ATTEMPTS => {
                attempt += 1;
            }
            Err(source) => {
                error!("Failed to start recording {:?}: {}", path, source);
                return Err(RecordingError::Init { path, source });
            }
        }
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.finish();
        }
    }
}
