//! Denoising network definition and checkpoint handling.

pub mod checkpoint;
mod dncnn;

pub use dncnn::{Dncnn, Topology};
