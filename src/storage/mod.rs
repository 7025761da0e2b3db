//! Storage Layer
//!
//! Handles persistence of watch words and the detected-text log.

pub mod text_log;
pub mod watch_words;

use anyhow::Result;
use std::path::PathBuf;

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "ocralarm", "OcrAlarm")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    get_config_dir()
        .map(|dir| dir.join("config.toml"))
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}
