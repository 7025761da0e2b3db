//! OCR (Optical Character Recognition) module
//!
//! Recognition itself is delegated to an external engine. The default engine
//! pipes each preprocessed image to the `tesseract` command line tool.

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, ImageFormat};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::debug;

use crate::config::OcrConfig;

/// Turns an image into text
///
/// Any `Ok` value is taken as the engine's answer for that frame, including
/// an empty string.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&GrayImage) -> Result<String> + Send + Sync,
{
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        self(image)
    }
}

/// OCR engine backed by the Tesseract executable
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    /// Path or name of the `tesseract` binary
    binary: PathBuf,
    /// Language passed with `-l`
    language: Option<String>,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>, language: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            language,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.tesseract_path.clone(), config.language.clone())
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let start = Instant::now();

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .context("Failed to encode image for OCR")?;

        let mut command = Command::new(&self.binary);
        command.arg("stdin").arg("stdout");
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {:?}", self.binary))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("tesseract stdin unavailable"))?;
            stdin.write_all(png.get_ref())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract exited with {}: {}", output.status, stderr.trim()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "Tesseract recognized {} chars in {:?}",
            text.trim().len(),
            start.elapsed()
        );
        Ok(text)
    }
}
