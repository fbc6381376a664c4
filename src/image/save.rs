//! Image saving utilities.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::error::{Error, Result};

use super::ImageTensor;

/// Save a tensor as an 8-bit grayscale image file.
///
/// The tensor is:
/// 1. Denormalized from [0, 1] to [0, 255] with clamping
/// 2. Saved to the specified path (format inferred from extension)
///
/// # Errors
///
/// Returns an error if the tensor is not a single-channel NCHW batch of
/// one, or if the image cannot be encoded.
pub fn save_image<P: AsRef<Path>>(tensor: &ImageTensor, path: P) -> Result<()> {
    let img = tensor_to_gray(tensor)?;
    save_gray(&img, path)
}

/// Write a grayscale image to disk, inferring the format from the path.
pub(crate) fn save_gray<P: AsRef<Path>>(image: &GrayImage, path: P) -> Result<()> {
    let path = path.as_ref();

    image.save(path).map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert a normalized NCHW tensor to an 8-bit grayscale image.
#[allow(clippy::cast_possible_truncation)]
pub fn tensor_to_gray(tensor: &ImageTensor) -> Result<GrayImage> {
    let (batch, channels, height, width) = tensor.dim();

    if batch != 1 || channels != 1 {
        return Err(Error::ShapeMismatch {
            expected: "(1, 1, H, W)".to_string(),
            actual: format!("({batch}, {channels}, {height}, {width})"),
        });
    }

    let mut img = GrayImage::new(width as u32, height as u32);

    for y in 0..height {
        for x in 0..width {
            let value = denormalize(tensor[[0, 0, y, x]]);
            // Safe: x and y come from the tensor's spatial dimensions
            img.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    Ok(img)
}

/// Denormalize a value from [0, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(0.0), 0);
        assert_eq!(denormalize(0.5), 128);
        assert_eq!(denormalize(1.0), 255);
    }

    #[test]
    fn test_denormalize_clamp() {
        assert_eq!(denormalize(-1.0), 0);
        assert_eq!(denormalize(2.0), 255);
    }

    #[test]
    fn test_tensor_to_gray_values() {
        let mut tensor = Array4::<f32>::zeros((1, 1, 2, 2));
        tensor[[0, 0, 0, 0]] = 1.0;
        tensor[[0, 0, 1, 1]] = 128.0 / 255.0;

        let img = tensor_to_gray(&tensor).unwrap();

        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 1)[0], 128);
    }

    #[test]
    fn test_tensor_to_gray_rejects_multichannel() {
        let tensor = Array4::<f32>::zeros((1, 3, 2, 2));

        assert!(matches!(
            tensor_to_gray(&tensor),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");

        let mut tensor = Array4::<f32>::zeros((1, 1, 3, 3));
        tensor[[0, 0, 1, 1]] = 1.0;

        save_image(&tensor, &path).unwrap();
        let reloaded = crate::image::load_image(&path).unwrap();

        assert_eq!(reloaded.shape(), &[1, 1, 3, 3]);
        assert!((reloaded[[0, 0, 1, 1]] - 1.0).abs() < f32::EPSILON);
        assert!(reloaded[[0, 0, 0, 0]].abs() < f32::EPSILON);
    }
}
