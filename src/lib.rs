//! # clearscan
//!
//! A library for cleaning up noisy grayscale document scans with a
//! learned convolutional denoiser (DnCNN) and binarizing them for
//! downstream document processing.
//!
//! The network predicts the noise component of its input and subtracts
//! it (residual learning); the denoised page is then binarized with a
//! locally adaptive threshold and contrast-stretched.
//!
//! ## Example
//!
//! ```no_run
//! use clearscan::{Config, Pipeline};
//!
//! # fn main() -> clearscan::Result<()> {
//! let config = Config::default();
//! let pipeline = Pipeline::new(config, "dncnn_gray.safetensors")?;
//!
//! pipeline.process("noisy_scan.png", "clean_scan.png")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{Config, Pipeline};
