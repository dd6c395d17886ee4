//! Generator network for WGAN-GP
//!
//! The Generator transforms latent noise vectors into synthetic images.
//! Architecture uses transposed 2D convolutions to upsample from a coarse grid.

use tch::{nn, nn::Module, nn::ModuleT, Device, Tensor};

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub latent_dim: i64,
    /// Base number of feature maps
    pub dim: i64,
    /// Number of output color channels
    pub channels: i64,
    /// Height and width of output images (multiple of 8)
    pub image_size: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latent_dim: 128,
            dim: 128,
            channels: 3,
            image_size: 32,
        }
    }
}

impl GeneratorConfig {
    /// Side length of the grid produced by the initial projection
    pub fn init_size(&self) -> i64 {
        self.image_size / 8
    }
}

/// Generator network
///
/// Architecture:
/// 1. Dense layer from latent space to a (4*dim, size/8, size/8) grid, ReLU
/// 2. Two ConvTranspose2d layers (kernel 2, stride 2) with BatchNorm and ReLU
/// 3. Final ConvTranspose2d to image channels with Tanh activation
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    /// Initial dense projection
    fc: nn::Linear,
    /// Transposed convolution layers
    deconv1: nn::ConvTranspose2D,
    bn1: nn::BatchNorm,
    deconv2: nn::ConvTranspose2D,
    bn2: nn::BatchNorm,
    deconv_out: nn::ConvTranspose2D,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Self {
        let dim = config.dim;
        let init = config.init_size();

        let fc = nn::linear(
            vs / "fc",
            config.latent_dim,
            4 * dim * init * init,
            Default::default(),
        );

        // Each stage doubles height and width
        let upsample = nn::ConvTransposeConfig {
            stride: 2,
            ..Default::default()
        };

        let deconv1 = nn::conv_transpose2d(vs / "deconv1", 4 * dim, 2 * dim, 2, upsample);
        let bn1 = nn::batch_norm2d(vs / "bn1", 2 * dim, Default::default());

        let deconv2 = nn::conv_transpose2d(vs / "deconv2", 2 * dim, dim, 2, upsample);
        let bn2 = nn::batch_norm2d(vs / "bn2", dim, Default::default());

        // Final layer: no batch norm, tanh activation
        let deconv_out =
            nn::conv_transpose2d(vs / "deconv_out", dim, config.channels, 2, upsample);

        Self {
            config,
            fc,
            deconv1,
            bn1,
            deconv2,
            bn2,
            deconv_out,
        }
    }

    /// Generate synthetic images from noise
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, latent_dim)
    /// * `train` - Whether batch norm uses batch statistics (and updates running ones)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, channels, image_size, image_size) in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let dim = self.config.dim;
        let init = self.config.init_size();

        let x = self.fc.forward(noise).relu();
        let x = x.view([-1, 4 * dim, init, init]);

        let x = self.deconv1.forward(&x);
        let x = self.bn1.forward_t(&x, train).relu();

        let x = self.deconv2.forward(&x);
        let x = self.bn2.forward_t(&x, train).relu();

        let x = self.deconv_out.forward(&x).tanh();

        let size = self.config.image_size;
        x.view([-1, self.config.channels, size, size])
    }

    /// Generate images without tracking gradients
    ///
    /// Batch norm runs on batch statistics, matching how the network is
    /// used throughout training.
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(noise, true))
    }

    /// Draw a batch of latent vectors from N(0, 1)
    pub fn sample_noise(&self, batch_size: i64, device: Device) -> Tensor {
        Tensor::randn(
            [batch_size, self.config.latent_dim],
            (tch::Kind::Float, device),
        )
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}
