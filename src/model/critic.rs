//! Critic network for WGAN-GP
//!
//! The Critic scores images with an unbounded real value (higher = more real).
//! Architecture uses strided 2D convolutions to downsample and extract features.

use tch::{nn, nn::Module, Tensor};

/// Critic network configuration
#[derive(Debug, Clone)]
pub struct CriticConfig {
    /// Base number of feature maps
    pub dim: i64,
    /// Number of input color channels
    pub channels: i64,
    /// Height and width of input images (multiple of 8)
    pub image_size: i64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            dim: 128,
            channels: 3,
            image_size: 32,
        }
    }
}

/// Critic network
///
/// Architecture:
/// 1. Three Conv2d layers (kernel 3, stride 2, padding 1) with LeakyReLU
/// 2. Flatten and Dense layer to a single score, no output activation
#[derive(Debug)]
pub struct Critic {
    config: CriticConfig,
    /// Convolution layers
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    conv3: nn::Conv2D,
    /// Final scoring layer
    fc: nn::Linear,
}

impl Critic {
    /// Create a new Critic network
    pub fn new(vs: &nn::Path, config: CriticConfig) -> Self {
        let dim = config.dim;

        let conv_config = nn::ConvConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", config.channels, dim, 3, conv_config);
        let conv2 = nn::conv2d(vs / "conv2", dim, 2 * dim, 3, conv_config);
        let conv3 = nn::conv2d(vs / "conv3", 2 * dim, 4 * dim, 3, conv_config);

        // Three stride-2 convolutions reduce each side by 8
        let final_size = config.image_size / 8;
        let flat_size = 4 * dim * final_size * final_size;

        let fc = nn::linear(vs / "fc", flat_size, 1, Default::default());

        Self {
            config,
            conv1,
            conv2,
            conv3,
            fc,
        }
    }

    /// Score a batch of images
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch_size, channels, image_size, image_size)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with unbounded scores
    pub fn forward(&self, input: &Tensor) -> Tensor {
        let x = self.conv1.forward(input).leaky_relu();
        let x = self.conv2.forward(&x).leaky_relu();
        let x = self.conv3.forward(&x).leaky_relu();

        let batch_size = x.size()[0];
        let x = x.view([batch_size, -1]);

        self.fc.forward(&x)
    }

    /// Get configuration
    pub fn config(&self) -> &CriticConfig {
        &self.config
    }
}

/// No dropout or batch norm: each score depends only on its own image.
impl Module for Critic {
    fn forward(&self, xs: &Tensor) -> Tensor {
        Critic::forward(self, xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    fn small_config() -> CriticConfig {
        CriticConfig {
            dim: 8,
            channels: 3,
            image_size: 32,
        }
    }

    #[test]
    fn test_critic_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let critic = Critic::new(&vs.root(), small_config());

        for batch_size in [1, 3, 7] {
            let input = Tensor::randn([batch_size, 3, 32, 32], (Kind::Float, Device::Cpu));
            let output = critic.forward(&input);
            assert_eq!(output.size(), vec![batch_size, 1]);
        }
    }

    #[test]
    fn test_critic_scores_are_unbounded() {
        let vs = VarStore::new(Device::Cpu);
        let critic = Critic::new(&vs.root(), small_config());

        // Scaling the input far outside the image range scales the score
        // past any probability bound
        let input = Tensor::randn([4, 3, 32, 32], (Kind::Float, Device::Cpu));
        let small = critic.forward(&input).abs().max().double_value(&[]);
        let large = critic.forward(&(input * 1e4)).abs().max().double_value(&[]);
        assert!(large > small);
        assert!(large > 1.0);
    }

    #[test]
    fn test_critic_default_flat_size() {
        let vs = VarStore::new(Device::Cpu);
        let critic = Critic::new(&vs.root(), CriticConfig::default());

        let input = Tensor::zeros([2, 3, 32, 32], (Kind::Float, Device::Cpu));
        assert_eq!(critic.forward(&input).size(), vec![2, 1]);
        assert_eq!(critic.config().dim, 128);
    }
}
