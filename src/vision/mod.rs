//! Vision/OCR Layer
//!
//! Prepares camera frames for recognition and hands them to an OCR engine.

pub mod deskew;
pub mod ocr;
pub mod preprocess;

pub use deskew::{deskew, estimate_skew_angle};
pub use ocr::{TesseractOcr, TextRecognizer};
pub use preprocess::{preprocess, ThresholdMethod};
