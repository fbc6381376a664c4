//! Custom error types for clearscan.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the clearscan library.
///
/// Every variant is terminal for the run it occurs in: nothing is caught
/// and retried, and no output file is written after a failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Failed to read a checkpoint file.
    #[error("failed to read checkpoint {path}: {source}")]
    CheckpointRead {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },

    /// Checkpoint file extension is not a recognized format.
    #[error("unsupported checkpoint format {extension:?} for {path}")]
    UnsupportedCheckpoint { path: PathBuf, extension: String },

    /// Checkpoint parameter names don't match the network topology.
    #[error(
        "checkpoint parameters do not match the network (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    CheckpointMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A checkpoint tensor has the wrong shape for its layer.
    #[error("checkpoint parameters for layer {layer} do not fit the network topology: {source}")]
    ParameterShape {
        layer: String,
        #[source]
        source: candle_core::Error,
    },

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Numeric backend failure during the forward pass.
    #[error("compute backend failed: {source}")]
    Compute {
        #[source]
        source: candle_core::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for clearscan operations.
pub type Result<T> = std::result::Result<T, Error>;
