//! Main denoising pipeline for scanned document pages.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use ndarray::Array4;

use crate::error::{Error, Result};
use crate::image::{self, ImageTensor};
use crate::model::{checkpoint, Dncnn, Topology};

use super::postprocess;

/// Compute device to run inference on.
///
/// Always passed in explicitly; nothing in the pipeline consults ambient
/// process-wide device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    /// Use an accelerated device if one is available, CPU otherwise.
    Auto,
    /// Force the CPU.
    Cpu,
    /// Force a specific CUDA device.
    Cuda(usize),
}

impl DevicePreference {
    /// Resolve the preference to a concrete device.
    ///
    /// # Errors
    ///
    /// Returns an error if a forced device cannot be initialized.
    pub fn resolve(self) -> Result<Device> {
        match self {
            Self::Auto => {
                Device::cuda_if_available(0).map_err(|source| Error::Compute { source })
            }
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(ordinal) => {
                Device::new_cuda(ordinal).map_err(|source| Error::Compute { source })
            }
        }
    }
}

impl FromStr for DevicePreference {
    type Err = Error;

    /// Parse `auto`, `cpu`, `cuda`, `gpu`, or `cuda:N`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(0)),
            _ => {
                if let Some(ordinal) = lower.strip_prefix("cuda:") {
                    let ordinal = ordinal.parse().map_err(|_| Error::InvalidParameter {
                        name: "device".to_string(),
                        reason: format!("invalid CUDA ordinal in {s:?}"),
                    })?;
                    Ok(Self::Cuda(ordinal))
                } else {
                    Err(Error::InvalidParameter {
                        name: "device".to_string(),
                        reason: format!("unknown device {s:?}, use auto, cpu, cuda or cuda:N"),
                    })
                }
            }
        }
    }
}

/// Configuration for the scan denoising pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Denoiser network topology.
    pub topology: Topology,

    /// Compute device to run inference on.
    pub device: DevicePreference,

    /// Neighborhood size for adaptive thresholding, in pixels. Must be odd.
    pub block_size: u32,

    /// Constant subtracted from the local threshold.
    pub offset: i16,

    /// Contrast gain applied after binarization.
    pub contrast_gain: f32,

    /// Optional path for the denoised image before binarization.
    pub raw_output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topology: Topology::default(),
            device: DevicePreference::Auto,
            block_size: postprocess::DEFAULT_BLOCK_SIZE,
            offset: postprocess::DEFAULT_OFFSET,
            contrast_gain: postprocess::DEFAULT_CONTRAST_GAIN,
            raw_output: None,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        self.topology.validate()?;

        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(Error::InvalidParameter {
                name: "block_size".to_string(),
                reason: "must be an odd number of at least 3".to_string(),
            });
        }

        if !self.contrast_gain.is_finite() || self.contrast_gain <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "contrast_gain".to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }

        Ok(())
    }
}

/// Main pipeline: denoise a scanned page and binarize it for downstream
/// document processing.
///
/// Parameters are read-only after construction, so one pipeline can
/// process images from multiple threads concurrently.
pub struct Pipeline {
    config: Config,
    device: Device,
    network: Dncnn,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration and checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the checkpoint
    /// cannot be read, or its parameters don't match the topology. The
    /// network is never left partially initialized.
    pub fn new<P: AsRef<Path>>(config: Config, checkpoint_path: P) -> Result<Self> {
        config.validate()?;

        let device = config.device.resolve()?;
        tracing::info!("Using device: {device:?}");

        let checkpoint_path = checkpoint_path.as_ref();
        tracing::info!("Loading checkpoint: {}", checkpoint_path.display());
        let parameters = checkpoint::read(checkpoint_path, &device)?;
        checkpoint::verify_names(&parameters, &config.topology.parameter_names())?;

        let vb = VarBuilder::from_tensors(parameters, DType::F32, &device);
        let network = Dncnn::load(config.topology, vb)?;

        tracing::info!("Pipeline initialized");

        Ok(Self {
            config,
            device,
            network,
        })
    }

    /// Denoise and binarize one scanned page.
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the noisy grayscale input image
    /// * `output_path` - Path to save the processed image
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails; no output file is written
    /// after a failure.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<()> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        tracing::info!("Processing image: {}", input_path.display());

        let input = image::load_image(input_path)?;

        tracing::info!("Running denoiser...");
        let input_device = to_device_tensor(&input, &self.device)?;
        let denoised = self.network.forward(&input_device)?;
        let denoised = to_host_tensor(&denoised)?;

        if let Some(ref raw_path) = self.config.raw_output {
            tracing::info!("Saving raw denoised image to: {}", raw_path.display());
            image::save_image(&denoised, raw_path)?;
        }

        tracing::info!("Binarizing...");
        let gray = image::tensor_to_gray(&denoised)?;
        let binary =
            postprocess::adaptive_threshold(&gray, self.config.block_size, self.config.offset);
        let stretched = postprocess::contrast_stretch(&binary, self.config.contrast_gain);

        tracing::info!("Saving output to: {}", output_path.display());
        image::save_gray(&stretched, output_path)?;

        tracing::info!("Processing complete");
        Ok(())
    }
}

/// Copy a host image tensor onto the compute device.
fn to_device_tensor(image: &ImageTensor, device: &Device) -> Result<Tensor> {
    let (batch, channels, height, width) = image.dim();
    let data: Vec<f32> = image.iter().copied().collect();

    Tensor::from_vec(data, (batch, channels, height, width), device)
        .map_err(|source| Error::Compute { source })
}

/// Copy a device tensor back into a host image tensor.
fn to_host_tensor(tensor: &Tensor) -> Result<ImageTensor> {
    let dims = tensor
        .dims4()
        .map_err(|source| Error::Compute { source })?;

    let data = tensor
        .flatten_all()
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|source| Error::Compute { source })?;

    Array4::from_shape_vec(dims, data).map_err(|_| Error::ShapeMismatch {
        expected: format!("{dims:?}"),
        actual: "reshape failed".to_string(),
    })
}
