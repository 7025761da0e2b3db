//! Frame data structures for camera content

use chrono::{DateTime, Local};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::FrameError;

/// A frame pulled from a camera source
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw interleaved pixel data (Gray, RGB or RGBA)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per pixel: 1, 3 or 4
    pub channels: u8,
    /// Wall-clock time the frame was captured
    pub captured_at: DateTime<Local>,
}

impl Frame {
    /// Create a frame, checking that the buffer matches the declared geometry
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self, FrameError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::Channels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            captured_at: Local::now(),
        })
    }

    /// Create an all-zero RGB frame
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
            channels: 3,
            captured_at: Local::now(),
        }
    }

    /// Build a frame from a decoded image
    pub fn from_image(image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
            channels: 3,
            captured_at: Local::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// View the frame as an `image` buffer
    pub fn to_image(&self) -> Result<DynamicImage, FrameError> {
        let size_error = || FrameError::BufferSize {
            width: self.width,
            height: self.height,
            channels: self.channels,
            expected: self.width as usize * self.height as usize * self.channels as usize,
            actual: self.data.len(),
        };

        let image = match self.channels {
            1 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgba8),
            other => return Err(FrameError::Channels(other)),
        };
        image.ok_or_else(size_error)
    }

    /// Single-channel copy of the frame
    pub fn to_gray(&self) -> Result<GrayImage, FrameError> {
        Ok(self.to_image()?.into_luma8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_short_buffer() {
        let result = Frame::new(vec![0; 10], 2, 2, 3);
        assert!(matches!(result, Err(FrameError::BufferSize { expected: 12, .. })));
    }

    #[test]
    fn test_new_rejects_bad_channels() {
        let result = Frame::new(vec![0; 8], 2, 2, 2);
        assert!(matches!(result, Err(FrameError::Channels(2))));
    }

    #[test]
    fn test_to_gray_from_rgb() {
        let frame = Frame::new(vec![255, 255, 255, 0, 0, 0], 2, 1, 3).unwrap();
        let gray = frame.to_gray().unwrap();
        assert_eq!(gray.dimensions(), (2, 1));
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_to_gray_from_gray_is_identity() {
        let frame = Frame::new(vec![10, 20, 30, 40], 2, 2, 1).unwrap();
        let gray = frame.to_gray().unwrap();
        assert_eq!(gray.into_raw(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_from_image_is_rgb() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(4, 3));
        let frame = Frame::from_image(image);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.channels, 3);
        assert_eq!(frame.data.len(), 36);
    }
}
