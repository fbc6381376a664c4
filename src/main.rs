//! clearscan CLI - denoise and binarize scanned document pages.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clearscan::model::Topology;
use clearscan::pipeline::{Config, DevicePreference, Pipeline};

/// Denoise scanned document pages with a learned convolutional denoiser.
#[derive(Parser, Debug)]
#[command(name = "clearscan")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image path (grayscale scan).
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output image path.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Denoiser checkpoint path (.safetensors, .pt or .pth).
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,

    /// Total convolutional depth of the network, endpoints included.
    #[arg(long, default_value = "20", value_name = "INT")]
    layers: usize,

    /// Hidden channel width of the network.
    #[arg(long, default_value = "64", value_name = "INT")]
    features: usize,

    /// Compute device: auto, cpu, cuda or cuda:N.
    #[arg(long, default_value = "auto", value_name = "DEVICE")]
    device: DevicePreference,

    /// Neighborhood size for adaptive thresholding, in pixels. Must be odd.
    #[arg(long, default_value = "35", value_name = "INT")]
    block_size: u32,

    /// Constant subtracted from the local threshold.
    #[arg(long, default_value = "5", value_name = "INT")]
    offset: i16,

    /// Contrast gain applied after binarization.
    #[arg(long, default_value = "1.5", value_name = "FLOAT")]
    contrast: f32,

    /// Also write the denoised image before binarization.
    #[arg(long, value_name = "PATH")]
    raw_output: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("clearscan={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    // Validate input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    // Build configuration
    let config = Config {
        topology: Topology {
            num_layers: args.layers,
            features: args.features,
            ..Topology::default()
        },
        device: args.device,
        block_size: args.block_size,
        offset: args.offset,
        contrast_gain: args.contrast,
        raw_output: args.raw_output.clone(),
    };

    // Create and run pipeline
    let pipeline = Pipeline::new(config, &args.model).context("Failed to initialize pipeline")?;

    pipeline
        .process(&args.input, &args.output)
        .context("Failed to process image")?;

    println!(
        "Successfully processed {} -> {}",
        args.input.display(),
        args.output.display()
    );

    Ok(())
}
