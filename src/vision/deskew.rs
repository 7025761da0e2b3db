//! Text block deskewing
//!
//! The skew angle comes from the minimum-area rectangle around all nonzero
//! pixels. The image is then rotated about its centre with bicubic sampling,
//! replicating edge pixels where the rotation reaches outside the frame.

use image::{GrayImage, Luma};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;

/// Rotations smaller than this (degrees) are not worth resampling for
const MIN_ROTATION_DEGREES: f32 = 0.05;

/// Bicubic kernel sharpness
const CUBIC_A: f32 = -0.75;

/// Straighten the dominant text block of a binarized image
///
/// Images without nonzero pixels are returned unchanged.
pub fn deskew(image: &GrayImage) -> GrayImage {
    match estimate_skew_angle(image) {
        Some(angle) if angle.abs() > MIN_ROTATION_DEGREES => rotate_about_center(image, angle),
        _ => image.clone(),
    }
}

/// Tilt of the nonzero pixel block in degrees, in `[-45, 45)`
///
/// Positive angles tilt clockwise as displayed (image y grows downwards).
/// The long side of the block's minimum-area rectangle is folded into
/// `[-90, 0)` and anything below -45 has 90 added. Rectangle corners are
/// whole pixels, so the estimate is good to about one pixel over the
/// block's length.
pub fn estimate_skew_angle(image: &GrayImage) -> Option<f32> {
    let points = boundary_points(image);
    if points.is_empty() {
        return None;
    }

    let corners = min_area_rect(&points);
    let Some(edge_angle) = long_edge_angle(&corners) else {
        return Some(0.0);
    };

    let angle = edge_angle.rem_euclid(90.0) - 90.0;
    Some(if angle < -45.0 { angle + 90.0 } else { angle })
}

/// Leftmost and rightmost nonzero pixel of every row
///
/// Interior pixels can never be hull vertices.
fn boundary_points(image: &GrayImage) -> Vec<Point<i32>> {
    let (width, height) = image.dimensions();
    let mut points = Vec::new();

    for y in 0..height {
        let first = (0..width).find(|&x| image.get_pixel(x, y)[0] > 0);
        let Some(first) = first else { continue };
        let last = (first..width).rev().find(|&x| image.get_pixel(x, y)[0] > 0).unwrap_or(first);

        points.push(Point::new(first as i32, y as i32));
        if last != first {
            points.push(Point::new(last as i32, y as i32));
        }
    }

    points
}

/// Direction in degrees of the longer of two adjacent rectangle sides.
/// `None` when that side is axis-aligned or the rectangle is a single point.
fn long_edge_angle(corners: &[Point<i32>; 4]) -> Option<f32> {
    let side = |a: Point<i32>, b: Point<i32>| (b.x - a.x, b.y - a.y);
    let first = side(corners[0], corners[1]);
    let second = side(corners[1], corners[2]);
    let length = |(dx, dy): (i32, i32)| i64::from(dx).pow(2) + i64::from(dy).pow(2);

    let (dx, dy) = if length(first) >= length(second) { first } else { second };
    if dx == 0 || dy == 0 {
        return None;
    }
    Some((dy as f32).atan2(dx as f32).to_degrees())
}

/// Rotate content by `-angle` degrees about the image centre
///
/// Output size equals input size. Samples falling outside the source are
/// clamped to the nearest edge pixel.
pub fn rotate_about_center(image: &GrayImage, angle: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return result;
    }

    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let (sin, cos) = angle.to_radians().sin_cos();

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let src_x = cx + dx * cos - dy * sin;
            let src_y = cy + dx * sin + dy * cos;
            result.put_pixel(x, y, Luma([sample_bicubic(image, src_x, src_y)]));
        }
    }

    result
}

fn cubic_weight(t: f32) -> f32 {
    let t = t.abs();
    if t <= 1.0 {
        ((CUBIC_A + 2.0) * t - (CUBIC_A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((CUBIC_A * t - 5.0 * CUBIC_A) * t + 8.0 * CUBIC_A) * t - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

/// 4x4 bicubic sample with edge replication
fn sample_bicubic(image: &GrayImage, x: f32, y: f32) -> u8 {
    let (width, height) = image.dimensions();
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut value = 0.0f32;
    for n in -1i64..=2 {
        let wy = cubic_weight(n as f32 - fy);
        if wy == 0.0 {
            continue;
        }
        let sy = (y0 as i64 + n).clamp(0, max_y) as u32;
        for m in -1i64..=2 {
            let wx = cubic_weight(m as f32 - fx);
            if wx == 0.0 {
                continue;
            }
            let sx = (x0 as i64 + m).clamp(0, max_x) as u32;
            value += wx * wy * image.get_pixel(sx, sy)[0] as f32;
        }
    }

    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Thick bar through the centre tilted by `degrees`
    fn tilted_bar(degrees: f32) -> GrayImage {
        let mut image = GrayImage::new(200, 200);
        let slope = degrees.to_radians().tan();
        for x in 40..160u32 {
            let center = 100.0 + slope * (x as f32 - 100.0);
            for offset in -3i32..=3 {
                let y = (center.round() as i32 + offset) as u32;
                image.put_pixel(x, y, Luma([255]));
            }
        }
        image
    }

    #[test]
    fn test_black_image_is_unchanged() {
        let image = GrayImage::new(30, 20);
        assert_eq!(estimate_skew_angle(&image), None);
        assert_eq!(deskew(&image), image);
    }

    #[test]
    fn test_white_image_is_unchanged() {
        let image = GrayImage::from_pixel(30, 20, Luma([255]));
        assert_eq!(estimate_skew_angle(&image), Some(0.0));
        assert_eq!(deskew(&image), image);
    }

    #[test]
    fn test_single_pixel_has_no_skew() {
        let mut image = GrayImage::new(10, 10);
        image.put_pixel(3, 4, Luma([255]));
        assert_eq!(estimate_skew_angle(&image), Some(0.0));
    }

    #[test]
    fn test_estimates_positive_tilt() {
        let angle = estimate_skew_angle(&tilted_bar(10.0)).unwrap();
        assert!((angle - 10.0).abs() < 2.0, "estimated {angle}");
    }

    #[test]
    fn test_estimates_negative_tilt() {
        let angle = estimate_skew_angle(&tilted_bar(-12.0)).unwrap();
        assert!((angle + 12.0).abs() < 2.0, "estimated {angle}");
    }

    #[test]
    fn test_deskew_levels_tilted_bar() {
        let straightened = deskew(&tilted_bar(10.0));
        assert_eq!(straightened.dimensions(), (200, 200));

        let angle = estimate_skew_angle(&straightened).unwrap();
        assert!(angle.abs() < 3.0, "residual {angle}");
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let image = tilted_bar(5.0);
        assert_eq!(rotate_about_center(&image, 0.0), image);
    }

    #[test]
    fn test_estimates_steep_tilt() {
        let angle = estimate_skew_angle(&tilted_bar(40.0)).unwrap();
        assert!((angle - 40.0).abs() < 2.0, "estimated {angle}");
    }

    #[test]
    fn test_level_bar_has_exactly_no_skew() {
        assert_eq!(estimate_skew_angle(&tilted_bar(0.0)), Some(0.0));
        assert_eq!(deskew(&tilted_bar(0.0)), tilted_bar(0.0));
    }

    #[test]
    fn test_long_edge_angle_of_degenerate_rects() {
        let p = Point::new(3, 4);
        assert_eq!(long_edge_angle(&[p; 4]), None);

        let q = Point::new(13, 14);
        let segment = long_edge_angle(&[p, q, q, p]).unwrap();
        assert!((segment - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_cubic_weight_partition_of_unity() {
        let fx = 0.3f32;
        let sum: f32 = (-1..=2).map(|m| cubic_weight(m as f32 - fx)).sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
