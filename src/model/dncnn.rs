//! Residual-learning convolutional denoiser (DnCNN).

use candle_core::Tensor;
use candle_nn::{Conv2d, Conv2dConfig, Module, VarBuilder};

use crate::error::{Error, Result};

/// Convolution kernel size used throughout the network.
const KERNEL_SIZE: usize = 3;

/// Network topology parameters.
///
/// `num_layers` counts every convolution, endpoints included, so the
/// number of hidden layers is `num_layers - 2` and `num_layers` must be
/// at least 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    /// Input tensor channel depth.
    pub in_channels: usize,

    /// Output tensor channel depth.
    pub out_channels: usize,

    /// Total convolutional depth, endpoints included.
    pub num_layers: usize,

    /// Hidden channel width.
    pub features: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            in_channels: 1,
            out_channels: 1,
            num_layers: 20,
            features: 64,
        }
    }
}

impl Topology {
    /// Validate the topology.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero or the depth leaves no
    /// room for the two endpoint convolutions.
    pub fn validate(&self) -> Result<()> {
        if self.num_layers < 2 {
            return Err(Error::InvalidParameter {
                name: "num_layers".to_string(),
                reason: "must be at least 2 (input and output convolutions)".to_string(),
            });
        }

        for (name, value) in [
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("features", self.features),
        ] {
            if value == 0 {
                return Err(Error::InvalidParameter {
                    name: name.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Number of hidden convolutions between the two endpoints.
    #[must_use]
    pub const fn hidden_layers(&self) -> usize {
        self.num_layers - 2
    }

    /// Parameter names a checkpoint must provide for this topology.
    ///
    /// Names follow the training layout: `in_conv.{weight,bias}`,
    /// `conv_list.<i>.{weight,bias}`, `out_conv.{weight,bias}`.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2 * self.num_layers);

        names.push("in_conv.weight".to_string());
        names.push("in_conv.bias".to_string());
        for i in 0..self.hidden_layers() {
            names.push(format!("conv_list.{i}.weight"));
            names.push(format!("conv_list.{i}.bias"));
        }
        names.push("out_conv.weight".to_string());
        names.push("out_conv.bias".to_string());

        names
    }
}

/// Fixed-topology convolutional stack predicting the noise component of
/// its input.
///
/// Parameters are immutable once loaded, so a single instance can serve
/// forward passes from multiple threads concurrently.
#[derive(Debug, Clone)]
pub struct Dncnn {
    in_conv: Conv2d,
    hidden: Vec<Conv2d>,
    out_conv: Conv2d,
}

impl Dncnn {
    /// Build the network, pulling its parameters out of `vb`.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology is invalid or a parameter tensor
    /// is missing or has the wrong shape for its layer.
    pub fn load(topology: Topology, vb: VarBuilder) -> Result<Self> {
        topology.validate()?;

        // Same-size padding keeps spatial dimensions intact end-to-end.
        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let in_conv = candle_nn::conv2d(
            topology.in_channels,
            topology.features,
            KERNEL_SIZE,
            conv_cfg,
            vb.pp("in_conv"),
        )
        .map_err(|source| Error::ParameterShape {
            layer: "in_conv".to_string(),
            source,
        })?;

        let mut hidden = Vec::with_capacity(topology.hidden_layers());
        for i in 0..topology.hidden_layers() {
            let conv = candle_nn::conv2d(
                topology.features,
                topology.features,
                KERNEL_SIZE,
                conv_cfg,
                vb.pp(format!("conv_list.{i}")),
            )
            .map_err(|source| Error::ParameterShape {
                layer: format!("conv_list.{i}"),
                source,
            })?;
            hidden.push(conv);
        }

        let out_conv = candle_nn::conv2d(
            topology.features,
            topology.out_channels,
            KERNEL_SIZE,
            conv_cfg,
            vb.pp("out_conv"),
        )
        .map_err(|source| Error::ParameterShape {
            layer: "out_conv".to_string(),
            source,
        })?;

        Ok(Self {
            in_conv,
            hidden,
            out_conv,
        })
    }

    /// Run a forward pass and return the denoised tensor.
    ///
    /// The convolution stack predicts the noise component; the returned
    /// tensor is `input - predicted_noise`, with the same shape as the
    /// input.
    ///
    /// # Errors
    ///
    /// Returns an error if the numeric backend fails.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut out = self
            .in_conv
            .forward(input)
            .and_then(|t| t.relu())
            .map_err(|source| Error::Compute { source })?;

        for conv in &self.hidden {
            out = conv
                .forward(&out)
                .and_then(|t| t.relu())
                .map_err(|source| Error::Compute { source })?;
        }

        // No activation after the output convolution.
        let noise = self
            .out_conv
            .forward(&out)
            .map_err(|source| Error::Compute { source })?;

        (input - &noise).map_err(|source| Error::Compute { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    fn zero_parameters(topology: Topology, device: &Device) -> HashMap<String, Tensor> {
        let mut map = HashMap::new();

        let conv = |out_c: usize, in_c: usize| {
            Tensor::zeros((out_c, in_c, 3, 3), DType::F32, device).unwrap()
        };
        let bias = |out_c: usize| Tensor::zeros(out_c, DType::F32, device).unwrap();

        map.insert(
            "in_conv.weight".to_string(),
            conv(topology.features, topology.in_channels),
        );
        map.insert("in_conv.bias".to_string(), bias(topology.features));
        for i in 0..topology.hidden_layers() {
            map.insert(
                format!("conv_list.{i}.weight"),
                conv(topology.features, topology.features),
            );
            map.insert(format!("conv_list.{i}.bias"), bias(topology.features));
        }
        map.insert(
            "out_conv.weight".to_string(),
            conv(topology.out_channels, topology.features),
        );
        map.insert("out_conv.bias".to_string(), bias(topology.out_channels));

        map
    }

    fn zero_network(topology: Topology) -> Dncnn {
        let device = Device::Cpu;
        let vb = VarBuilder::from_tensors(zero_parameters(topology, &device), DType::F32, &device);
        Dncnn::load(topology, vb).unwrap()
    }

    fn ramp_input(height: usize, width: usize) -> Tensor {
        let data: Vec<f32> = (0..height * width).map(|i| i as f32 * 0.01).collect();
        Tensor::from_vec(data, (1, 1, height, width), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_depth_too_small_is_rejected() {
        let topology = Topology {
            num_layers: 1,
            ..Topology::default()
        };

        assert!(matches!(
            topology.validate(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_hidden_layer_count() {
        let topology = Topology {
            num_layers: 5,
            ..Topology::default()
        };

        assert_eq!(topology.hidden_layers(), 3);
        assert_eq!(topology.parameter_names().len(), 10);
    }

    #[test]
    fn test_minimum_depth_has_no_hidden_layers() {
        let topology = Topology {
            num_layers: 2,
            features: 4,
            ..Topology::default()
        };

        assert_eq!(topology.hidden_layers(), 0);

        // Two endpoint convolutions back to back still form a valid network.
        let network = zero_network(topology);
        let input = ramp_input(5, 5);
        let output = network.forward(&input).unwrap();

        assert_eq!(output.dims4().unwrap(), (1, 1, 5, 5));
    }

    #[test]
    fn test_parameter_names_layout() {
        let topology = Topology {
            num_layers: 4,
            ..Topology::default()
        };

        assert_eq!(
            topology.parameter_names(),
            vec![
                "in_conv.weight",
                "in_conv.bias",
                "conv_list.0.weight",
                "conv_list.0.bias",
                "conv_list.1.weight",
                "conv_list.1.bias",
                "out_conv.weight",
                "out_conv.bias",
            ]
        );
    }

    #[test]
    fn test_shape_preserved() {
        let topology = Topology {
            num_layers: 4,
            features: 8,
            ..Topology::default()
        };
        let network = zero_network(topology);

        let input = ramp_input(6, 9);
        let output = network.forward(&input).unwrap();

        assert_eq!(output.dims4().unwrap(), (1, 1, 6, 9));
    }

    #[test]
    fn test_zero_parameters_make_forward_the_identity() {
        // With all-zero weights and biases the predicted noise is zero,
        // so the residual subtraction must return the input untouched.
        let topology = Topology {
            num_layers: 4,
            features: 8,
            ..Topology::default()
        };
        let network = zero_network(topology);

        let input = ramp_input(7, 7);
        let output = network.forward(&input).unwrap();

        assert_eq!(
            input.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            output.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        );
    }

    #[test]
    fn test_forward_is_deterministic() {
        let topology = Topology {
            num_layers: 3,
            features: 8,
            ..Topology::default()
        };
        let network = zero_network(topology);
        let input = ramp_input(4, 6);

        let first = network.forward(&input).unwrap();
        let second = network.forward(&input).unwrap();

        assert_eq!(
            first.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            second.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        );
    }

    #[test]
    fn test_wrong_parameter_shape_is_reported() {
        let device = Device::Cpu;
        let topology = Topology {
            num_layers: 2,
            features: 4,
            ..Topology::default()
        };

        let mut params = zero_parameters(topology, &device);
        // Wrong hidden width for the input convolution.
        params.insert(
            "in_conv.weight".to_string(),
            Tensor::zeros((8, 1, 3, 3), DType::F32, &device).unwrap(),
        );

        let vb = VarBuilder::from_tensors(params, DType::F32, &device);
        let result = Dncnn::load(topology, vb);

        assert!(matches!(
            result,
            Err(Error::ParameterShape { ref layer, .. }) if layer == "in_conv"
        ));
    }
}
