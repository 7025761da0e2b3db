//! Alarm Monitor
//!
//! Ties the pipeline together: frames are pulled on an ingestion thread,
//! recognized and buffered; a second thread checks the buffer against the
//! watch words on a fixed cadence and starts alarm recordings.

use anyhow::Result;
use chrono::Local;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::analysis::{find_alarm, Detection, DetectionBuffer, WatchWords};
use crate::capture::{validate_source_url, Frame, FrameSource, SourceOpener};
use crate::config::{AppConfig, OcrPreprocessing};
use crate::error::{MonitorError, RecordingError};
use crate::recording::{StartOutcome, VideoRecorder};
use crate::shared::{MonitorEvent, MonitorState, RuntimeState, StopReason};
use crate::storage::text_log::TextLog;
use crate::storage::watch_words;
use crate::vision::{preprocess, TextRecognizer};

const EVENT_QUEUE_SIZE: usize = 256;

/// State shared by the caller, the ingestion thread, the checker thread and
/// post-alarm timers
struct Shared {
    buffer: Mutex<DetectionBuffer>,
    words: RwLock<WatchWords>,
    recorder: VideoRecorder,
    recognizer: Arc<dyn TextRecognizer>,
    preprocessing: RwLock<OcrPreprocessing>,
    recording_enabled: AtomicBool,
    save_text: AtomicBool,
    text_log: TextLog,
    runtime: RwLock<RuntimeState>,
    events: Sender<MonitorEvent>,
    stop_requested: AtomicBool,
}

impl Shared {
    fn emit(&self, event: MonitorEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => trace!("Event queue full, dropping {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn recognize(&self, frame: &Frame) -> Result<String> {
        let settings = self.preprocessing.read().clone();
        let image = preprocess(frame, &settings)?;
        self.recognizer.recognize(&image)
    }

    fn process_frame(&self, frame: &Frame) -> Option<Detection> {
        self.runtime.write().frames_processed += 1;

        if self.recording_enabled.load(Ordering::Relaxed) {
            self.recorder.add_frame(frame);
        }

        let text = match panic::catch_unwind(AssertUnwindSafe(|| self.recognize(frame))) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Skipping frame, recognition failed: {:#}", e);
                self.runtime.write().frames_failed += 1;
                return None;
            }
            Err(_) => {
                warn!("Skipping frame, recognizer panicked");
                self.runtime.write().frames_failed += 1;
                return None;
            }
        };

        let detection = self.buffer.lock().append(&text, None)?;
        debug!("Detected text: {}", detection.text());

        if self.save_text.load(Ordering::Relaxed) {
            if let Err(e) = self.text_log.append(&detection) {
                warn!("Failed to save detected text: {:#}", e);
            }
        }

        self.emit(MonitorEvent::Detection(detection.clone()));
        Some(detection)
    }

    fn check_alarm(self: &Arc<Self>) -> Option<String> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let words = self.words.read();
            let buffer = self.buffer.lock();
            find_alarm(words.words(), &buffer)
        }));
        let word = match outcome {
            Ok(word) => word?,
            Err(_) => {
                error!("Alarm check failed, treating as no match");
                return None;
            }
        };

        let newly_alarmed = {
            let mut runtime = self.runtime.write();
            let changed = runtime.alarm_word.as_deref() != Some(word.as_str());
            runtime.alarm_word = Some(word.clone());
            changed
        };
        if newly_alarmed {
            info!("Alarm triggered for word: {}", word);
            self.emit(MonitorEvent::Alarm {
                word: word.clone(),
                at: Local::now(),
            });
        }

        if self.recording_enabled.load(Ordering::Relaxed) && !self.recorder.is_recording() {
            // Failures are logged and reported by start_recording
            let _ = self.start_recording();
        }

        Some(word)
    }

    /// Start a recording and arm its post-alarm stop timer
    fn start_recording(self: &Arc<Self>) -> Result<StartOutcome, RecordingError> {
        let outcome = match self.recorder.start() {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                // The checker retries every tick; report each distinct failure once
                let repeated = self.runtime.read().last_error.as_deref() == Some(message.as_str());
                if repeated {
                    debug!("Could not start alarm recording: {}", message);
                } else {
                    error!("Could not start alarm recording: {}", message);
                    self.runtime.write().set_error(message.clone());
                    self.emit(MonitorEvent::RecordingFailed(message));
                }
                return Err(e);
            }
        };

        if let StartOutcome::Started { id, path } = &outcome {
            self.runtime.write().recording = true;
            self.emit(MonitorEvent::RecordingStarted { path: path.clone() });

            let shared = Arc::clone(self);
            let id = *id;
            let delay = self.recorder.settings().post_alarm();
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                shared.stop_recording_session(Some(id));
            });
        }

        Ok(outcome)
    }

    /// Stop the given session, or whichever is open when `id` is None
    fn stop_recording_session(&self, id: Option<u64>) {
        let summary = match id {
            Some(id) => self.recorder.stop_session(id),
            None => self.recorder.stop(),
        };
        if let Some(summary) = summary {
            self.runtime.write().recording = self.recorder.is_recording();
            self.emit(MonitorEvent::RecordingStopped {
                path: summary.path,
                frames: summary.frames_written,
            });
        }
    }

    /// Pull frames until the source ends, fails or a stop is requested
    fn ingest(&self, mut source: Box<dyn FrameSource>) -> StopReason {
        loop {
            if self.stop_requested.load(Ordering::Relaxed) {
                return StopReason::Requested;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| source.next_frame())) {
                Ok(Ok(Some(frame))) => {
                    self.process_frame(&frame);
                }
                Ok(Ok(None)) => {
                    info!("Camera stream ended");
                    return StopReason::EndOfStream;
                }
                Ok(Err(e)) => {
                    error!("Failed to read from camera: {:#}", e);
                    return StopReason::SourceError(format!("{:#}", e));
                }
                Err(_) => {
                    error!("Camera source panicked");
                    return StopReason::SourceError("camera source panicked".to_string());
                }
            }
        }
    }
}

/// Watches a camera stream for watch words
pub struct AlarmMonitor {
    shared: Arc<Shared>,
    events: Receiver<MonitorEvent>,
    check_interval: Duration,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl AlarmMonitor {
    /// Create a monitor with the configured recorder.
    ///
    /// An unsupported recording format does not prevent watching; it is
    /// reported when an alarm tries to record.
    pub fn new(config: &AppConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        let recorder = VideoRecorder::new(config.recording.clone());
        Self::with_recorder(config, recognizer, recorder)
    }

    /// Create a monitor around an existing recorder
    pub fn with_recorder(config: &AppConfig, recognizer: Arc<dyn TextRecognizer>, recorder: VideoRecorder) -> Self {
        let (tx, rx) = bounded(EVENT_QUEUE_SIZE);
        let shared = Shared {
            buffer: Mutex::new(DetectionBuffer::new(config.ocr.buffer_size)),
            words: RwLock::new(WatchWords::new(config.alarm.default_words.iter().cloned())),
            recorder,
            recognizer,
            preprocessing: RwLock::new(config.ocr.preprocessing.clone()),
            recording_enabled: AtomicBool::new(config.recording.enabled),
            save_text: AtomicBool::new(config.ocr.save_detected_text),
            text_log: TextLog::new(config.ocr.text_save_directory.clone()),
            runtime: RwLock::new(RuntimeState::default()),
            events: tx,
            stop_requested: AtomicBool::new(false),
        };

        Self {
            shared: Arc::new(shared),
            events: rx,
            check_interval: config.alarm.check_interval(),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Start watching a camera stream
    pub fn start(&self, url: &str, opener: &dyn SourceOpener) -> Result<(), MonitorError> {
        let mut threads = self.threads.lock();
        if self.shared.runtime.read().is_watching() {
            return Err(MonitorError::AlreadyWatching);
        }
        // Threads from a loop that ended on its own
        for handle in threads.drain(..) {
            let _ = handle.join();
        }

        validate_source_url(url)?;
        let url = url.trim().to_string();
        let source = opener.open(&url).map_err(|e| {
            let reason = format!("{:#}", e);
            self.shared.runtime.write().set_error(reason.clone());
            MonitorError::SourceUnavailable {
                url: url.clone(),
                reason,
            }
        })?;

        self.shared.stop_requested.store(false, Ordering::Relaxed);
        {
            let mut runtime = self.shared.runtime.write();
            runtime.state = MonitorState::Watching;
            runtime.source_url = Some(url.clone());
            runtime.frames_processed = 0;
            runtime.frames_failed = 0;
            runtime.clear_error();
        }
        info!("Watching camera stream {}", url);
        self.shared.emit(MonitorEvent::Started { url });

        // Dropped when ingestion ends, which wakes the checker for a last pass
        let (done_tx, done_rx) = bounded::<()>(0);

        let shared = Arc::clone(&self.shared);
        threads.push(std::thread::spawn(move || {
            let reason = shared.ingest(source);
            {
                let mut runtime = shared.runtime.write();
                runtime.state = MonitorState::Idle;
                if let StopReason::SourceError(message) = &reason {
                    runtime.set_error(message.clone());
                }
            }
            info!("Stopped watching: {:?}", reason);
            shared.emit(MonitorEvent::Stopped { reason });
            drop(done_tx);
        }));

        let shared = Arc::clone(&self.shared);
        let ticker = tick(self.check_interval);
        threads.push(std::thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    shared.check_alarm();
                }
                recv(done_rx) -> _ => {
                    shared.check_alarm();
                    break;
                }
            }
        }));

        Ok(())
    }

    /// Stop watching; recordings in progress keep running until their timer
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Relaxed);
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("Monitor thread panicked");
            }
        }
    }

    /// Stop watching and close any open recording
    pub fn shutdown(&self) {
        self.stop();
        self.shared.stop_recording_session(None);
    }

    /// Run one ingestion step on a frame
    pub fn process_frame(&self, frame: &Frame) -> Option<Detection> {
        self.shared.process_frame(frame)
    }

    /// Run one alarm check, returning the matched word
    pub fn check_alarm(&self) -> Option<String> {
        self.shared.check_alarm()
    }

    /// Clear buffered text and the alarm state; recordings are left alone
    pub fn reset(&self) {
        self.shared.buffer.lock().clear();
        self.shared.runtime.write().alarm_word = None;
        info!("Alarm state reset");
    }

    /// Start a recording now, as if an alarm fired
    pub fn start_recording(&self) -> Result<StartOutcome, RecordingError> {
        self.shared.start_recording()
    }

    /// Close the open recording, if any
    pub fn stop_recording(&self) {
        self.shared.stop_recording_session(None);
    }

    /// Turning recording off also closes an open recording
    pub fn set_recording_enabled(&self, enabled: bool) {
        self.shared.recording_enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.shared.stop_recording_session(None);
        }
        info!("Alarm recording {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn recording_enabled(&self) -> bool {
        self.shared.recording_enabled.load(Ordering::Relaxed)
    }

    pub fn set_save_detected_text(&self, enabled: bool) {
        self.shared.save_text.store(enabled, Ordering::Relaxed);
    }

    pub fn set_preprocessing(&self, settings: OcrPreprocessing) {
        *self.shared.preprocessing.write() = settings;
    }

    pub fn set_watch_words<I, S>(&self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = self.shared.words.write();
        list.set(words);
        info!("Alarm words updated: {}", list.to_csv());
    }

    pub fn set_watch_words_csv(&self, csv: &str) {
        let mut list = self.shared.words.write();
        list.set_from_csv(csv);
        info!("Alarm words updated: {}", list.to_csv());
    }

    pub fn watch_words(&self) -> Vec<String> {
        self.shared.words.read().words().to_vec()
    }

    /// Replace the watch words with those in an export document
    pub fn import_watch_words(&self, path: &Path) -> Result<()> {
        let words = watch_words::import_words(path)?;
        self.set_watch_words(words);
        Ok(())
    }

    pub fn export_watch_words(&self, path: &Path) -> Result<()> {
        watch_words::export_words(path, self.shared.words.read().words())
    }

    /// Last `k` detections, oldest first
    pub fn recent_detections(&self, k: usize) -> Vec<Detection> {
        self.shared.buffer.lock().recent(k)
    }

    pub fn status(&self) -> RuntimeState {
        let mut status = self.shared.runtime.read().clone();
        status.recording = self.shared.recorder.is_recording();
        status
    }

    pub fn recorder(&self) -> &VideoRecorder {
        &self.shared.recorder
    }

    /// Receiver for monitor events
    pub fn events(&self) -> Receiver<MonitorEvent> {
        self.events.clone()
    }
}

impl Drop for AlarmMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
