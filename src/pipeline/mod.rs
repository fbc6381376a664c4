//! Scan denoising and binarization pipeline.

mod denoise;
pub mod postprocess;

pub use denoise::{Config, DevicePreference, Pipeline};
