//! Logging setup
//!
//! Console output in the configured format, plus a plain-text copy in a
//! per-day file under `logging.directory`. `RUST_LOG` overrides the level.
//! The file switches to a new day's name at the first event after midnight.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use parking_lot::{Mutex, MutexGuard};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Log file for a given day
pub fn log_file_path(directory: &Path, day: NaiveDate) -> PathBuf {
    directory.join(format!("ocr_alarm_{}.log", day.format("%Y%m%d")))
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);

    let stdout_layer = match config.format {
        LogFormat::Full => fmt::layer().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    // An unusable log directory only costs the file copy
    let file_layer = if config.directory.as_os_str().is_empty() {
        None
    } else {
        match DailyLogFile::open(&config.directory) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(file)),
            Err(e) => {
                eprintln!("Log file disabled: {e}");
                None
            }
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn open_log_file(directory: &Path, day: NaiveDate) -> io::Result<File> {
    std::fs::create_dir_all(directory)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(directory, day))
}

struct OpenLog {
    day: NaiveDate,
    file: File,
}

/// Append-only log file named after the current local day
pub struct DailyLogFile {
    directory: PathBuf,
    current: Mutex<OpenLog>,
}

impl DailyLogFile {
    pub fn open(directory: &Path) -> io::Result<Self> {
        let day = Local::now().date_naive();
        let file = open_log_file(directory, day)?;
        Ok(Self {
            directory: directory.to_path_buf(),
            current: Mutex::new(OpenLog { day, file }),
        })
    }

    /// Writer for `day`, reopening the file when the day has changed.
    /// If the new file can't be opened the previous one keeps receiving lines.
    fn writer_for(&self, day: NaiveDate) -> DailyLogWriter<'_> {
        let mut log = self.current.lock();
        if log.day != day {
            match open_log_file(&self.directory, day) {
                Ok(file) => *log = OpenLog { day, file },
                Err(e) => eprintln!("Log file rollover failed: {e}"),
            }
        }
        DailyLogWriter { log }
    }

    /// Day whose file currently receives lines
    pub fn current_day(&self) -> NaiveDate {
        self.current.lock().day
    }
}

pub struct DailyLogWriter<'a> {
    log: MutexGuard<'a, OpenLog>,
}

impl Write for DailyLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.file.flush()
    }
}

impl<'a> MakeWriter<'a> for DailyLogFile {
    type Writer = DailyLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer_for(Local::now().date_naive())
    }
}
