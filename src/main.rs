//! OCR Alarm - camera stream watch-word alarm
//!
//! Command line driver for the alarm monitor: watch a stream, manage watch
//! words and configuration, or try the preprocessing pipeline on an image.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ocr_alarm::capture::{Frame, HttpCameraOpener};
use ocr_alarm::config::{self, AppConfig};
use ocr_alarm::logging::init_logging;
use ocr_alarm::shared::MonitorEvent;
use ocr_alarm::storage::{self, watch_words};
use ocr_alarm::vision::{preprocess, TesseractOcr, TextRecognizer};
use ocr_alarm::AlarmMonitor;

/// OCR Alarm - raise alarms on watch words seen by a camera
#[derive(Parser, Debug)]
#[command(name = "ocr-alarm")]
#[command(about = "Watches a camera stream with OCR and records around watch-word alarms")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a camera stream until it ends or Ctrl-C
    Watch(WatchArgs),
    /// Manage watch words
    Words {
        #[command(subcommand)]
        action: WordsAction,
    },
    /// Show or initialize the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the OCR preprocessing pipeline on an image file
    Preprocess {
        input: PathBuf,
        output: PathBuf,
        /// Also run OCR on the result and print the text
        #[arg(long)]
        recognize: bool,
    },
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Camera URL (http://, https:// or rtsp://)
    #[arg(short, long)]
    url: Option<String>,

    /// Record around alarms
    #[arg(long)]
    record: bool,

    /// Append recognized text to the daily text log
    #[arg(long)]
    save_text: bool,

    /// Comma-separated watch words, replacing the words file
    #[arg(short, long)]
    words: Option<String>,
}

#[derive(Subcommand, Debug)]
enum WordsAction {
    /// Print the current watch words
    List,
    /// Replace the words file with a comma-separated list
    Set { words: String },
    /// Replace the words file with words from a JSON export
    Import { path: PathBuf },
    /// Write the current words to a JSON export
    Export { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(storage::default_config_path);
    let config = config::load_or_create_config(&config_path);

    init_logging(&config.logging)?;
    info!("Using configuration {:?}", config_path);

    match cli.command {
        Command::Watch(args) => run_watch(config, args),
        Command::Words { action } => run_words(&config, action),
        Command::Config { action } => run_config(&config, &config_path, action),
        Command::Preprocess {
            input,
            output,
            recognize,
        } => run_preprocess(&config, input, output, recognize),
    }
}

/// Words from the words file, or the configured defaults
fn current_words(config: &AppConfig) -> Result<Vec<String>> {
    watch_words::load_words_file(&config.alarm.words_file, &config.alarm.default_words)
}

fn run_watch(config: AppConfig, args: WatchArgs) -> Result<()> {
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractOcr::from_config(&config.ocr));
    let monitor = AlarmMonitor::new(&config, recognizer);

    match &args.words {
        Some(csv) => monitor.set_watch_words_csv(csv),
        None => monitor.set_watch_words(current_words(&config)?),
    }
    if args.record {
        monitor.set_recording_enabled(true);
    }
    if args.save_text {
        monitor.set_save_detected_text(true);
    }

    let url = args.url.unwrap_or_else(|| config.camera.default_url.clone());
    let opener = HttpCameraOpener::from_config(&config.camera);
    monitor.start(&url, &opener)?;

    // The HTTP source blocks, so the runtime only waits for Ctrl-C and pumps events
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let events = monitor.events();
    runtime.block_on(async {
        let pump = tokio::task::spawn_blocking(move || {
            while let Ok(event) = events.recv() {
                let finished = matches!(event, MonitorEvent::Stopped { .. });
                print_event(&event);
                if finished {
                    break;
                }
            }
        });

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, shutting down");
            }
            _ = pump => {}
        }
    });

    monitor.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(1));

    let status = monitor.status();
    info!(
        "Processed {} frames ({} skipped)",
        status.frames_processed, status.frames_failed
    );
    Ok(())
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Started { url } => println!("Watching {}", url),
        MonitorEvent::Detection(detection) => println!("{}", detection),
        MonitorEvent::Alarm { word, at } => {
            println!("ALARM! '{}' detected at {}", word, at.format("%Y-%m-%d %H:%M:%S"))
        }
        MonitorEvent::RecordingStarted { path } => println!("Recording to {}", path.display()),
        MonitorEvent::RecordingStopped { path, frames } => {
            println!("Recording saved: {} ({} frames)", path.display(), frames)
        }
        MonitorEvent::RecordingFailed(message) => println!("Recording failed: {}", message),
        MonitorEvent::Stopped { reason } => println!("Stopped: {:?}", reason),
    }
}

fn run_words(config: &AppConfig, action: WordsAction) -> Result<()> {
    let words_file = &config.alarm.words_file;
    match action {
        WordsAction::List => {
            for word in current_words(config)? {
                println!("{}", word);
            }
        }
        WordsAction::Set { words } => {
            let mut list = ocr_alarm::analysis::WatchWords::default();
            list.set_from_csv(&words);
            watch_words::save_words_file(words_file, list.words())?;
            println!("Saved {} watch words to {}", list.len(), words_file.display());
        }
        WordsAction::Import { path } => {
            let words = watch_words::import_words(&path)?;
            watch_words::save_words_file(words_file, &words)?;
            println!("Imported {} watch words into {}", words.len(), words_file.display());
        }
        WordsAction::Export { path } => {
            watch_words::export_words(&path, &current_words(config)?)?;
            println!("Exported watch words to {}", path.display());
        }
    }
    Ok(())
}

fn run_config(config: &AppConfig, path: &std::path::Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config::save_config(&AppConfig::default(), path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

fn run_preprocess(config: &AppConfig, input: PathBuf, output: PathBuf, recognize: bool) -> Result<()> {
    let image = image::open(&input).with_context(|| format!("Failed to open {:?}", input))?;
    let frame = Frame::from_image(image);

    let mut settings = config.ocr.preprocessing.clone();
    settings.enabled = true;
    let processed = preprocess(&frame, &settings)?;
    processed
        .save(&output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    println!(
        "Wrote {}x{} image to {}",
        processed.width(),
        processed.height(),
        output.display()
    );

    if recognize {
        let text = TesseractOcr::from_config(&config.ocr).recognize(&processed)?;
        println!("{}", text.trim());
    }
    Ok(())
}
