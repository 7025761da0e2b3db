//! Append-only log of recognized text, one file per day

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analysis::Detection;

/// Writes detections to `<directory>/ocr_text_<YYYYmmdd>.txt`
#[derive(Debug, Clone)]
pub struct TextLog {
    directory: PathBuf,
}

impl TextLog {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File a detection belongs to, chosen by its own date
    pub fn file_for(&self, detection: &Detection) -> PathBuf {
        self.directory
            .join(format!("ocr_text_{}.txt", detection.timestamp().format("%Y%m%d")))
    }

    /// Append one `[timestamp] text` line
    pub fn append(&self, detection: &Detection) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.directory)?;
        let path = self.file_for(detection);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", detection)?;

        debug!("Detected text saved to {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    #[test]
    fn test_appends_lines_to_daily_file() {
        let dir = tempdir().unwrap();
        let log = TextLog::new(dir.path().join("texts"));
        let at = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let first = Detection::new(" exit blocked ", at).unwrap();
        let second = Detection::new("smoke", at).unwrap();
        let path = log.append(&first).unwrap();
        log.append(&second).unwrap();

        assert!(path.ends_with("ocr_text_20250102.txt"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "[2025-01-02 03:04:05.000] exit blocked\n[2025-01-02 03:04:05.000] smoke\n"
        );
    }

    #[test]
    fn test_separate_days_use_separate_files() {
        let dir = tempdir().unwrap();
        let log = TextLog::new(dir.path());
        let monday = Detection::new("a", Local.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()).unwrap();
        let tuesday = Detection::new("b", Local.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap()).unwrap();

        assert_ne!(log.append(&monday).unwrap(), log.append(&tuesday).unwrap());
    }
}
