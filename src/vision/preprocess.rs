//! Image preprocessing filters for OCR optimization
//!
//! Turns a camera frame into a single-channel image that OCR engines read
//! reliably. Steps run in a fixed order and each one can be switched off:
//! resize, grayscale, denoise, threshold, contrast, deskew.

use image::imageops::FilterType;
use image::GrayImage;
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use tracing::debug;

use crate::capture::Frame;
use crate::config::OcrPreprocessing;
use crate::error::FrameError;
use crate::vision::deskew::deskew;

/// Global level used by the `simple` method
const SIMPLE_THRESHOLD: u8 = 127;

/// Gaussian sigma matching an 11x11 adaptive block
const ADAPTIVE_SIGMA: f32 = 2.0;

/// Constant subtracted from the local mean by the `adaptive` method
const ADAPTIVE_OFFSET: i16 = 2;

/// Supported binarization methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMethod {
    /// Fixed global level
    Simple,
    /// Gaussian-weighted local mean
    Adaptive,
    /// Automatic global level
    Otsu,
}

impl ThresholdMethod {
    /// Parse a configured method name; unknown names yield `None`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "adaptive" => Some(Self::Adaptive),
            "otsu" => Some(Self::Otsu),
            _ => None,
        }
    }
}

/// Run the configured preprocessing steps on a frame
///
/// With preprocessing disabled this is a plain grayscale conversion. The only
/// error is a frame whose buffer does not match its declared size.
pub fn preprocess(frame: &Frame, settings: &OcrPreprocessing) -> Result<GrayImage, FrameError> {
    if !settings.enabled {
        return frame.to_gray();
    }

    debug!(
        "OCR preprocessing: resize_width={}, denoise={}, threshold={}, contrast={}, deskew={}",
        settings.resize_width,
        settings.denoise,
        settings.threshold_method,
        settings.contrast_enhance,
        settings.deskew
    );

    let mut image = frame.to_image()?;
    if let Some((width, height)) = target_size(image.width(), image.height(), settings.resize_width) {
        image = image.resize_exact(width, height, FilterType::Triangle);
    }

    let mut gray = image.into_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Ok(gray);
    }

    if settings.denoise {
        gray = median_filter(&gray, 1, 1);
    }

    match ThresholdMethod::parse(&settings.threshold_method) {
        Some(method) => gray = apply_threshold(&gray, method),
        None => debug!("Unknown threshold method '{}', skipping", settings.threshold_method),
    }

    if settings.contrast_enhance {
        gray = apply_equalization(gray);
    }

    if settings.deskew {
        gray = deskew(&gray);
    }

    Ok(gray)
}

/// Size after scaling to `resize_width` with the aspect ratio kept
///
/// Returns `None` when no resize is needed.
fn target_size(width: u32, height: u32, resize_width: u32) -> Option<(u32, u32)> {
    if resize_width == 0 || width == 0 || height == 0 {
        return None;
    }
    let new_height = ((resize_width as u64 * height as u64) / width as u64).max(1) as u32;
    if (resize_width, new_height) == (width, height) {
        None
    } else {
        Some((resize_width, new_height))
    }
}

/// Binarize with the given method
pub fn apply_threshold(gray: &GrayImage, method: ThresholdMethod) -> GrayImage {
    match method {
        ThresholdMethod::Simple => binarize(gray, SIMPLE_THRESHOLD),
        ThresholdMethod::Otsu => binarize(gray, otsu_level(gray)),
        ThresholdMethod::Adaptive => adaptive_gaussian(gray),
    }
}

/// Pixels above `level` become white, the rest black
fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut result = gray.clone();
    for pixel in result.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    result
}

/// Compare each pixel against its Gaussian-weighted neighbourhood mean
fn adaptive_gaussian(gray: &GrayImage) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, ADAPTIVE_SIGMA);
    let mut result = gray.clone();
    for (pixel, mean) in result.pixels_mut().zip(local_mean.pixels()) {
        let level = mean[0] as i16 - ADAPTIVE_OFFSET;
        pixel[0] = if pixel[0] as i16 > level { 255 } else { 0 };
    }
    result
}

/// Histogram equalization; constant images have nothing to spread and are kept
fn apply_equalization(gray: GrayImage) -> GrayImage {
    let mut values = gray.pixels().map(|p| p[0]);
    let Some(first) = values.next() else {
        return gray;
    };
    if values.all(|v| v == first) {
        return gray;
    }
    equalize_histogram(&gray)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_steps() -> OcrPreprocessing {
        OcrPreprocessing {
            enabled: true,
            resize_width: 64,
            denoise: true,
            threshold_method: "adaptive".to_string(),
            contrast_enhance: true,
            deskew: true,
        }
    }

    #[test]
    fn test_preprocessing_disabled_is_grayscale() {
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 255], 2, 1, 3).unwrap();
        let settings = OcrPreprocessing::default();

        let gray = preprocess(&frame, &settings).unwrap();

        assert_eq!(gray.dimensions(), (2, 1));
        // Red weighs more than blue in luma
        assert!(gray.get_pixel(0, 0)[0] > gray.get_pixel(1, 0)[0]);
    }

    #[test]
    fn test_all_zero_frame_keeps_resized_dimensions() {
        let frame = Frame::blank(100, 50);
        let gray = preprocess(&frame, &all_steps()).unwrap();
        assert_eq!(gray.dimensions(), (64, 32));
    }

    #[test]
    fn test_all_white_frame_survives_every_method() {
        let frame = Frame::new(vec![255; 40 * 30 * 3], 40, 30, 3).unwrap();
        for method in ["simple", "adaptive", "otsu", "bogus"] {
            let mut settings = all_steps();
            settings.threshold_method = method.to_string();
            settings.resize_width = 0;

            let gray = preprocess(&frame, &settings).unwrap();
            assert_eq!(gray.dimensions(), (40, 30), "method {method}");
        }
    }

    #[test]
    fn test_unknown_threshold_leaves_image_unthresholded() {
        let frame = Frame::new(vec![100; 8 * 8], 8, 8, 1).unwrap();
        let settings = OcrPreprocessing {
            enabled: true,
            resize_width: 0,
            denoise: false,
            threshold_method: "sauvola".to_string(),
            contrast_enhance: false,
            deskew: false,
        };

        let gray = preprocess(&frame, &settings).unwrap();
        assert!(gray.pixels().all(|p| p[0] == 100));
    }

    #[test]
    fn test_simple_threshold() {
        let gray = GrayImage::from_raw(3, 1, vec![10, 127, 200]).unwrap();
        let result = apply_threshold(&gray, ThresholdMethod::Simple);
        assert_eq!(result.into_raw(), vec![0, 0, 255]);
    }

    #[test]
    fn test_otsu_splits_two_levels() {
        let mut data = vec![20u8; 50];
        data.extend(vec![220u8; 50]);
        let gray = GrayImage::from_raw(10, 10, data).unwrap();

        let result = apply_threshold(&gray, ThresholdMethod::Otsu);

        assert_eq!(result.get_pixel(0, 0)[0], 0);
        assert_eq!(result.get_pixel(9, 9)[0], 255);
    }

    #[test]
    fn test_adaptive_marks_dark_spot() {
        let mut gray = GrayImage::from_pixel(15, 15, image::Luma([200]));
        gray.put_pixel(7, 7, image::Luma([20]));

        let result = apply_threshold(&gray, ThresholdMethod::Adaptive);

        assert_eq!(result.get_pixel(7, 7)[0], 0);
        assert_eq!(result.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_threshold_method_parse() {
        assert_eq!(ThresholdMethod::parse("Otsu"), Some(ThresholdMethod::Otsu));
        assert_eq!(ThresholdMethod::parse(" simple "), Some(ThresholdMethod::Simple));
        assert_eq!(ThresholdMethod::parse("adaptive"), Some(ThresholdMethod::Adaptive));
        assert_eq!(ThresholdMethod::parse("mean"), None);
    }

    #[test]
    fn test_target_size_truncates_height() {
        assert_eq!(target_size(640, 480, 320), Some((320, 240)));
        assert_eq!(target_size(300, 100, 100), Some((100, 33)));
        assert_eq!(target_size(640, 480, 640), None);
        assert_eq!(target_size(640, 480, 0), None);
        assert_eq!(target_size(1000, 1, 10), Some((10, 1)));
    }

    #[test]
    fn test_equalization_skips_constant_image() {
        let gray = GrayImage::from_pixel(4, 4, image::Luma([0]));
        let result = apply_equalization(gray);
        assert!(result.pixels().all(|p| p[0] == 0));
    }
}
