//! Image loading utilities.

use std::path::Path;

use image::GrayImage;
use ndarray::Array4;

use crate::error::{Error, Result};

use super::{ImageTensor, GRAY_CHANNELS};

/// Load an image from disk and convert to a normalized tensor.
///
/// The image is:
/// 1. Loaded from the specified path
/// 2. Converted to single-channel grayscale if necessary
/// 3. Normalized to [0, 1] range
/// 4. Returned as an NCHW tensor (1, 1, H, W) at native resolution
///
/// # Errors
///
/// Returns an error if the image cannot be loaded or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ImageTensor> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(gray_to_tensor(&img.to_luma8()))
}

/// Convert a grayscale image to a normalized NCHW tensor.
fn gray_to_tensor(gray: &GrayImage) -> ImageTensor {
    let (width, height) = gray.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, GRAY_CHANNELS, height as usize, width as usize));

    for (x, y, pixel) in gray.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = f32::from(pixel[0]) / 255.0;
    }

    tensor
}
