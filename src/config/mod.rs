//! Application Configuration
//!
//! Camera, OCR, alarm, recording and logging settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Watch words used when neither a words file nor an import provides any
pub const DEFAULT_WATCH_WORDS: &[&str] = &[
    "599:",
    "home theater",
    "smoke",
    "danger",
    "alert",
    "warning",
    "hazard",
    "emergency",
];

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera source settings
    pub camera: CameraConfig,
    /// OCR settings
    pub ocr: OcrConfig,
    /// Alarm settings
    pub alarm: AlarmConfig,
    /// Alarm recording settings
    pub recording: RecordingConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Camera source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// URL opened when none is given on the command line
    pub default_url: String,
    /// Width frames are scaled to on ingestion (0 = keep source size)
    pub frame_width: u32,
    /// Height frames are scaled to on ingestion (0 = keep source size)
    pub frame_height: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_url: "http://localhost:8080/video_feed".to_string(),
            frame_width: 640,
            frame_height: 480,
            connection_timeout: 10,
        }
    }
}

impl CameraConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout.max(1))
    }
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Maximum number of detections kept for alarm matching
    pub buffer_size: usize,
    /// Append every detection to the daily text log
    pub save_detected_text: bool,
    /// Directory for the daily text logs
    pub text_save_directory: PathBuf,
    /// Tesseract executable
    pub tesseract_path: PathBuf,
    /// Tesseract language code (e.g. "eng")
    pub language: Option<String>,
    /// Image preprocessing applied before recognition
    pub preprocessing: OcrPreprocessing,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            save_detected_text: false,
            text_save_directory: PathBuf::from("detected_texts"),
            tesseract_path: PathBuf::from("tesseract"),
            language: None,
            preprocessing: OcrPreprocessing::default(),
        }
    }
}

/// Preprocessing steps applied to each frame before OCR
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrPreprocessing {
    /// When false the frame is only converted to grayscale
    pub enabled: bool,
    /// Target width in pixels, height follows the aspect ratio (0 = keep)
    pub resize_width: u32,
    /// Apply median smoothing
    pub denoise: bool,
    /// One of "simple", "adaptive", "otsu"; anything else skips thresholding
    pub threshold_method: String,
    /// Apply histogram equalization
    pub contrast_enhance: bool,
    /// Straighten tilted text blocks
    pub deskew: bool,
}

impl Default for OcrPreprocessing {
    fn default() -> Self {
        Self {
            enabled: false,
            resize_width: 640,
            denoise: true,
            threshold_method: "adaptive".to_string(),
            contrast_enhance: true,
            deskew: true,
        }
    }
}

/// Alarm settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Fallback watch words
    pub default_words: Vec<String>,
    /// Plain text file with one watch word per line
    pub words_file: PathBuf,
    /// How often the detection buffer is scanned, in milliseconds
    pub check_interval_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            default_words: DEFAULT_WATCH_WORDS.iter().map(|w| w.to_string()).collect(),
            words_file: PathBuf::from("alarm_words.txt"),
            check_interval_ms: 1000,
        }
    }
}

impl AlarmConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(10))
    }
}

/// Output frame size for recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Alarm recording settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Start a recording when an alarm fires
    pub enabled: bool,
    /// Directory recordings are written to
    pub output_directory: PathBuf,
    /// Output format ("mjpeg")
    pub format: String,
    /// Frames per second of the output and of the pre-alarm window
    pub fps: u32,
    /// Output frame size
    pub resolution: Resolution,
    /// Seconds of footage kept from before the alarm
    pub pre_alarm_duration: u64,
    /// Seconds a recording continues after the alarm
    pub post_alarm_duration: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_directory: PathBuf::from("recordings"),
            format: "mjpeg".to_string(),
            fps: 20,
            resolution: Resolution::default(),
            pre_alarm_duration: 5,
            post_alarm_duration: 10,
        }
    }
}

impl RecordingConfig {
    /// Number of frames the pre-alarm window holds
    pub fn pre_alarm_frames(&self) -> usize {
        let frames = self.pre_alarm_duration.saturating_mul(u64::from(self.fps));
        usize::try_from(frames).unwrap_or(usize::MAX).max(1)
    }

    pub fn post_alarm(&self) -> Duration {
        Duration::from_secs(self.post_alarm_duration)
    }
}

/// Console and file log output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "ocr_alarm=debug"
    pub level: String,
    /// Directory for daily log files (empty = console only)
    pub directory: PathBuf,
    /// Output style
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            format: LogFormat::Full,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load configuration, falling back to (and persisting) defaults.
///
/// A missing file is created with defaults. A file that cannot be parsed is
/// moved to `<name>.bak` before the defaults are written in its place.
pub fn load_or_create_config(path: &Path) -> AppConfig {
    if path.exists() {
        match load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(e) => {
                warn!("Failed to load configuration from {:?}: {}", path, e);
                let backup = path.with_extension("toml.bak");
                if let Err(e) = std::fs::rename(path, &backup) {
                    warn!("Could not move broken configuration aside: {}", e);
                } else {
                    info!("Broken configuration moved to {:?}", backup);
                }
            }
        }
    } else {
        info!("Configuration file {:?} not found, using defaults", path);
    }

    let config = AppConfig::default();
    if let Err(e) = save_config(&config, path) {
        warn!("Failed to persist default configuration: {}", e);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.camera.default_url, "http://localhost:8080/video_feed");
        assert_eq!(config.camera.frame_width, 640);
        assert_eq!(config.camera.connection_timeout, 10);

        assert_eq!(config.ocr.buffer_size, 100);
        assert!(!config.ocr.save_detected_text);
        assert!(!config.ocr.preprocessing.enabled);
        assert_eq!(config.ocr.preprocessing.threshold_method, "adaptive");

        assert_eq!(config.alarm.default_words.len(), 8);
        assert_eq!(config.alarm.check_interval(), Duration::from_secs(1));

        assert!(!config.recording.enabled);
        assert_eq!(config.recording.fps, 20);
        assert_eq!(config.recording.pre_alarm_frames(), 100);
        assert_eq!(config.recording.post_alarm(), Duration::from_secs(10));

        assert_eq!(config.logging.format, LogFormat::Full);
    }

    #[test]
    fn test_pre_alarm_frames_saturates() {
        let huge = RecordingConfig {
            fps: u32::MAX,
            pre_alarm_duration: u64::MAX,
            ..Default::default()
        };
        assert_eq!(huge.pre_alarm_frames(), usize::MAX);

        let empty = RecordingConfig {
            fps: 0,
            ..Default::default()
        };
        assert_eq!(empty.pre_alarm_frames(), 1);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.recording.resolution = Resolution {
            width: 320,
            height: 240,
        };
        config.logging.format = LogFormat::Compact;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.recording.resolution, config.recording.resolution);
        assert_eq!(parsed.logging.format, LogFormat::Compact);
        assert_eq!(parsed.alarm.default_words, config.alarm.default_words);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [ocr]
            buffer_size = 7

            [ocr.preprocessing]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.ocr.buffer_size, 7);
        assert!(parsed.ocr.preprocessing.enabled);
        assert!(parsed.ocr.preprocessing.deskew);
        assert_eq!(parsed.recording.fps, 20);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.camera.default_url, loaded.camera.default_url);
        assert_eq!(config.recording.post_alarm_duration, loaded.recording.post_alarm_duration);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = load_or_create_config(&path);

        assert!(path.exists());
        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.ocr.buffer_size, config.ocr.buffer_size);
    }

    #[test]
    fn test_broken_config_is_replaced_and_backed_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "camera = [[[").unwrap();

        let config = load_or_create_config(&path);

        assert_eq!(config.ocr.buffer_size, 100);
        assert!(dir.path().join("config.toml.bak").exists());
        assert!(load_config(&path).is_ok());
    }
}
