//! Recording output writers
//!
//! A recording is written through a [`FrameSink`]. Sinks are created by a
//! [`SinkFactory`] chosen from the configured output format.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::capture::Frame;
use crate::config::{RecordingConfig, Resolution};
use crate::error::RecordingError;

const JPEG_QUALITY: u8 = 85;

/// An open recording file
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Opens sinks for new recordings
pub trait SinkFactory: Send + Sync {
    /// File extension for outputs, without the dot
    fn extension(&self) -> &str;

    /// Open a new output at `path`. Must fail with an `AlreadyExists` I/O
    /// error rather than replace an existing file.
    fn create(&self, path: &Path) -> Result<Box<dyn FrameSink>>;
}

/// Whether a sink creation failed because the output already exists
pub fn is_already_exists(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::AlreadyExists)
    })
}

/// Pick the sink factory for a configured format
pub fn factory_for(config: &RecordingConfig) -> Result<Box<dyn SinkFactory>, RecordingError> {
    match config.format.to_ascii_lowercase().as_str() {
        "mjpeg" | "mjpg" => Ok(Box::new(MjpegSinkFactory::new(config.resolution))),
        other => Err(RecordingError::UnsupportedFormat(other.to_string())),
    }
}

/// Motion JPEG: concatenated JPEG images, playable by ffplay/VLC
pub struct MjpegSinkFactory {
    resolution: Resolution,
}

impl MjpegSinkFactory {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }
}

impl SinkFactory for MjpegSinkFactory {
    fn extension(&self) -> &str {
        "mjpeg"
    }

    fn create(&self, path: &Path) -> Result<Box<dyn FrameSink>> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        Ok(Box::new(MjpegSink {
            writer: BufWriter::new(file),
            resolution: self.resolution,
        }))
    }
}

pub struct MjpegSink {
    writer: BufWriter<File>,
    resolution: Resolution,
}

impl FrameSink for MjpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let image = frame.to_image()?;
        let Resolution { width, height } = self.resolution;
        let image = if image.width() != width || image.height() != height {
            image.resize_exact(width, height, FilterType::Triangle)
        } else {
            image
        };

        let encoder = JpegEncoder::new_with_quality(&mut self.writer, JPEG_QUALITY);
        image.into_rgb8().write_with_encoder(encoder)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
