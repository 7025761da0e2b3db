//! Watch-word persistence
//!
//! Two formats: a plain words file with one word per line, and a JSON
//! export document used to move word lists between installations.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Exported watch-word document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchWordExport {
    /// Words in matching order
    pub alarm_words: Vec<String>,
    /// When the export was written
    pub exported_at: DateTime<Local>,
}

/// Load a words file, falling back to `defaults` when it does not exist
pub fn load_words_file(path: &Path, defaults: &[String]) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let words: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect();
            info!("Loaded {} watch words from {:?}", words.len(), path);
            Ok(words)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Watch word file {:?} not found, using defaults", path);
            Ok(defaults.to_vec())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read watch words from {:?}", path)),
    }
}

/// Write a words file, one word per line
pub fn save_words_file(path: &Path, words: &[String]) -> Result<()> {
    let mut content = words.join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    info!("Saved {} watch words to {:?}", words.len(), path);
    Ok(())
}

/// Export words as a JSON document
pub fn export_words(path: &Path, words: &[String]) -> Result<()> {
    let document = WatchWordExport {
        alarm_words: words.to_vec(),
        exported_at: Local::now(),
    };
    let content = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, content)?;
    info!("Alarm words exported to {:?}", path);
    Ok(())
}

/// Read words from a JSON export document
pub fn import_words(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let document: WatchWordExport = serde_json::from_str(&content)
        .with_context(|| format!("{:?} is not a watch word export", path))?;
    info!("Alarm words imported from {:?}", path);
    Ok(document.alarm_words)
}
