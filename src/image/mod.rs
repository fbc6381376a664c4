//! Image loading, conversion, and saving utilities.

mod load;
mod save;

pub use load::load_image;
pub use save::{save_image, tensor_to_gray};
pub(crate) use save::save_gray;

use ndarray::Array4;

/// Image tensor in NCHW format (batch, channels, height, width).
/// Values are normalized to [0, 1]; spatial dimensions are kept at the
/// decoded image's native resolution.
pub type ImageTensor = Array4<f32>;

/// Number of channels in grayscale images.
pub const GRAY_CHANNELS: usize = 1;
