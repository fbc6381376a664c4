//! Post-processing for denoised scans: binarization and contrast.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Default neighborhood size for adaptive thresholding, in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 35;

/// Default constant subtracted from the local threshold.
pub const DEFAULT_OFFSET: i16 = 5;

/// Default contrast gain applied after binarization.
pub const DEFAULT_CONTRAST_GAIN: f32 = 1.5;

/// Binarize an image with a locally adaptive, Gaussian-weighted threshold.
///
/// A pixel becomes white (255) when it is brighter than the
/// Gaussian-weighted mean of its `block_size` neighborhood minus
/// `offset`, and black (0) otherwise. Flat regions therefore classify
/// uniformly as background regardless of their absolute brightness.
#[must_use]
pub fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let local_mean = gaussian_blur_f32(image, sigma_for_block(block_size));

    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let threshold = i16::from(local_mean.get_pixel(x, y)[0]) - offset;
        let value = if i16::from(pixel[0]) > threshold { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }

    out
}

/// Linear contrast stretch with saturation.
///
/// Each pixel is scaled by `gain` and clamped to [0, 255], so already
/// saturated images pass through unchanged for any `gain >= 1`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn contrast_stretch(image: &GrayImage, gain: f32) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        // Safe: clamped to [0, 255] range before casting
        let value = (f32::from(pixel[0]) * gain).round().clamp(0.0, 255.0) as u8;
        out.put_pixel(x, y, Luma([value]));
    }

    out
}

/// Gaussian sigma matching a square averaging window of `block_size`
/// pixels: `0.3 * ((block_size - 1) / 2 - 1) + 0.8`.
#[allow(clippy::cast_precision_loss)]
fn sigma_for_block(block_size: u32) -> f32 {
    0.3_f32.mul_add((block_size as f32 - 1.0) * 0.5 - 1.0, 0.8)
}
