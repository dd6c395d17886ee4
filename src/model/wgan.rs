//! WGAN wrapper combining Generator and Critic
//!
//! Owns both networks together with their variable stores and builds
//! one optimizer per network.

use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Tensor};

use super::critic::{Critic, CriticConfig};
use super::generator::{Generator, GeneratorConfig};

/// Adam hyperparameters shared by both networks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamParams {
    /// Learning rate
    pub lr: f64,
    /// Decay rate of the first-moment estimate
    pub beta1: f64,
    /// Decay rate of the second-moment estimate
    pub beta2: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            lr: 1e-4,
            beta1: 0.5,
            beta2: 0.9,
        }
    }
}

/// Complete WGAN model
pub struct Wgan {
    /// Generator network
    pub generator: Generator,
    /// Critic network
    pub critic: Critic,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for critic
    pub critic_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl Wgan {
    /// Create a new WGAN model
    ///
    /// # Arguments
    ///
    /// * `gen_config` - Generator configuration
    /// * `critic_config` - Critic configuration
    /// * `device` - Device to create model on
    pub fn new(gen_config: GeneratorConfig, critic_config: CriticConfig, device: Device) -> Self {
        let gen_vs = VarStore::new(device);
        let critic_vs = VarStore::new(device);

        let generator = Generator::new(&gen_vs.root(), gen_config);
        let critic = Critic::new(&critic_vs.root(), critic_config);

        Self {
            generator,
            critic,
            gen_vs,
            critic_vs,
            device,
        }
    }

    /// Create a WGAN whose networks share width, channel count and image size
    ///
    /// # Arguments
    ///
    /// * `latent_dim` - Size of latent noise vector
    /// * `dim` - Base number of feature maps in both networks
    /// * `channels` - Number of image channels
    /// * `image_size` - Image height and width (multiple of 8)
    /// * `device` - Device to create model on
    pub fn with_dims(
        latent_dim: i64,
        dim: i64,
        channels: i64,
        image_size: i64,
        device: Device,
    ) -> Self {
        let gen_config = GeneratorConfig {
            latent_dim,
            dim,
            channels,
            image_size,
        };

        let critic_config = CriticConfig {
            dim,
            channels,
            image_size,
        };

        Self::new(gen_config, critic_config, device)
    }

    /// Generate synthetic images
    ///
    /// # Returns
    ///
    /// Tensor of shape (num_samples, channels, image_size, image_size) in [-1, 1]
    pub fn generate(&self, num_samples: i64) -> Tensor {
        let noise = self.sample_noise(num_samples);
        self.generator.generate(&noise)
    }

    /// Generate images from specific noise vectors
    pub fn generate_from_noise(&self, noise: &Tensor) -> Tensor {
        self.generator.generate(noise)
    }

    /// Draw a batch of latent vectors on the model's device
    pub fn sample_noise(&self, batch_size: i64) -> Tensor {
        self.generator.sample_noise(batch_size, self.device)
    }

    /// Critic scores for a batch of images, shape (batch_size, 1)
    pub fn score(&self, images: &Tensor) -> Tensor {
        self.critic.forward(images)
    }

    /// Build the generator optimizer
    pub fn gen_optimizer(&self, params: AdamParams) -> anyhow::Result<nn::Optimizer> {
        build_adam(&self.gen_vs, params)
    }

    /// Build the critic optimizer
    pub fn critic_optimizer(&self, params: AdamParams) -> anyhow::Result<nn::Optimizer> {
        build_adam(&self.critic_vs, params)
    }

    /// Stop tracking gradients for critic parameters
    pub fn freeze_critic(&mut self) {
        self.critic_vs.freeze();
    }

    /// Resume tracking gradients for critic parameters
    pub fn unfreeze_critic(&mut self) {
        self.critic_vs.unfreeze();
    }

    /// Save model weights
    pub fn save(&self, gen_path: &str, critic_path: &str) -> anyhow::Result<()> {
        self.gen_vs.save(gen_path)?;
        self.critic_vs.save(critic_path)?;
        Ok(())
    }

    /// Load model weights
    pub fn load(&mut self, gen_path: &str, critic_path: &str) -> anyhow::Result<()> {
        self.gen_vs.load(gen_path)?;
        self.critic_vs.load(critic_path)?;
        Ok(())
    }

    /// Get latent dimension
    pub fn latent_dim(&self) -> i64 {
        self.generator.config().latent_dim
    }

    /// Get base feature-map width
    pub fn dim(&self) -> i64 {
        self.critic.config().dim
    }

    /// Get number of image channels
    pub fn channels(&self) -> i64 {
        self.generator.config().channels
    }

    /// Get image height and width
    pub fn image_size(&self) -> i64 {
        self.generator.config().image_size
    }

    /// Interpolate between two points in latent space
    ///
    /// Useful for visualizing smooth transitions between generated images
    ///
    /// # Arguments
    ///
    /// * `z1` - First latent vector
    /// * `z2` - Second latent vector
    /// * `steps` - Number of interpolation steps (at least 2)
    ///
    /// # Returns
    ///
    /// Tensor of shape (steps, channels, image_size, image_size)
    pub fn interpolate(&self, z1: &Tensor, z2: &Tensor, steps: i64) -> Tensor {
        let steps = steps.max(2);
        let latents: Vec<Tensor> = (0..steps)
            .map(|i| {
                let alpha = i as f64 / (steps - 1) as f64;
                z1 * (1.0 - alpha) + z2 * alpha
            })
            .collect();

        // One batch keeps batch norm statistics shared across the path
        self.generator.generate(&Tensor::stack(&latents, 0))
    }
}

fn build_adam(vs: &VarStore, params: AdamParams) -> anyhow::Result<nn::Optimizer> {
    let optimizer = nn::Adam {
        beta1: params.beta1,
        beta2: params.beta2,
        ..Default::default()
    }
    .build(vs, params.lr)?;
    Ok(optimizer)
}

/// Sum of L2 norms of all trainable variables in a store
pub fn parameter_norm(vs: &VarStore) -> f64 {
    tch::no_grad(|| {
        vs.trainable_variables()
            .iter()
            .map(|t| t.norm().double_value(&[]))
            .sum()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_wgan() -> Wgan {
        Wgan::with_dims(16, 8, 3, 32, Device::Cpu)
    }

    #[test]
    fn test_wgan_creation() {
        let wgan = small_wgan();

        assert_eq!(wgan.latent_dim(), 16);
        assert_eq!(wgan.dim(), 8);
        assert_eq!(wgan.channels(), 3);
        assert_eq!(wgan.image_size(), 32);
    }

    #[test]
    fn test_wgan_generate() {
        let wgan = small_wgan();

        let samples = wgan.generate(4);
        assert_eq!(samples.size(), vec![4, 3, 32, 32]);
    }

    #[test]
    fn test_wgan_score() {
        let wgan = small_wgan();

        let images = Tensor::randn([4, 3, 32, 32], (tch::Kind::Float, Device::Cpu));
        let scores = wgan.score(&images);

        assert_eq!(scores.size(), vec![4, 1]);
    }

    #[test]
    fn test_wgan_interpolate() {
        let wgan = small_wgan();

        let z1 = Tensor::randn([16], (tch::Kind::Float, Device::Cpu));
        let z2 = Tensor::randn([16], (tch::Kind::Float, Device::Cpu));

        let interpolated = wgan.interpolate(&z1, &z2, 10);
        assert_eq!(interpolated.size(), vec![10, 3, 32, 32]);
    }

    #[test]
    fn test_freeze_critic() {
        let mut wgan = small_wgan();

        wgan.freeze_critic();
        assert!(wgan.critic_vs.trainable_variables().iter().all(|t| !t.requires_grad()));

        wgan.unfreeze_critic();
        assert!(wgan.critic_vs.trainable_variables().iter().all(|t| t.requires_grad()));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let gen_path = dir.path().join("generator.pt");
        let critic_path = dir.path().join("critic.pt");
        let gen_path = gen_path.to_str().unwrap();
        let critic_path = critic_path.to_str().unwrap();

        let wgan = small_wgan();
        wgan.save(gen_path, critic_path).unwrap();

        let mut restored = small_wgan();
        restored.load(gen_path, critic_path).unwrap();

        assert!((parameter_norm(&wgan.gen_vs) - parameter_norm(&restored.gen_vs)).abs() < 1e-6);
        assert!(
            (parameter_norm(&wgan.critic_vs) - parameter_norm(&restored.critic_vs)).abs() < 1e-6
        );
    }

    #[test]
    fn test_optimizers_build() {
        let wgan = small_wgan();
        assert!(wgan.gen_optimizer(AdamParams::default()).is_ok());
        assert!(wgan.critic_optimizer(AdamParams::default()).is_ok());
    }
}
