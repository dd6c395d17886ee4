//! Configuration management
//!
//! Provides unified configuration for the entire WGAN-GP pipeline. Defaults
//! reproduce the reference CIFAR-10 run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::{AdamParams, Wgan};
use crate::training::{GradientPenalty, TrainingConfig};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the CIFAR-10 binary batches
    pub dataset_dir: String,
    /// Batch size
    pub batch_size: usize,
    /// Seed for batch shuffling (entropy-seeded when absent)
    pub shuffle_seed: Option<u64>,
}

/// Model-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent dimension size
    pub latent_dim: i64,
    /// Base number of feature maps in both networks
    pub dim: i64,
    /// Number of image channels
    pub channels: i64,
    /// Image height and width
    pub image_size: i64,
}

/// Training-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfigFile {
    /// Number of generator iterations
    pub iterations: usize,
    /// Critic steps per generator step
    pub critic_iters: usize,
    /// Generator learning rate
    pub gen_lr: f64,
    /// Critic learning rate
    pub critic_lr: f64,
    /// Adam beta1 for both networks
    pub beta1: f64,
    /// Adam beta2 for both networks
    pub beta2: f64,
    /// Gradient penalty form
    pub penalty: GradientPenalty,
    /// Report frequency in iterations
    pub report_every: usize,
    /// Number of sample images per report
    pub sample_count: i64,
    /// Checkpoint save frequency (0 disables periodic checkpoints)
    pub checkpoint_every: usize,
    /// Checkpoint directory
    pub checkpoint_dir: String,
    /// Directory for scalar logs and sample images
    pub output_dir: String,
    /// Device: "cpu" or "cuda"
    pub device: String,
    /// Seed for libtorch's random generator
    pub seed: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                dataset_dir: "data/cifar-10-batches-bin".to_string(),
                batch_size: 64,
                shuffle_seed: None,
            },
            model: ModelConfig {
                latent_dim: 128,
                dim: 128,
                channels: 3,
                image_size: 32,
            },
            training: TrainingConfigFile {
                iterations: 200_000,
                critic_iters: 5,
                gen_lr: 1e-4,
                critic_lr: 1e-4,
                beta1: 0.5,
                beta2: 0.9,
                penalty: GradientPenalty::default(),
                report_every: 100,
                sample_count: 5,
                checkpoint_every: 10_000,
                checkpoint_dir: "checkpoints".to_string(),
                output_dir: "runs/wgan_gp_cifar10".to_string(),
                device: "cuda".to_string(),
                seed: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from TOML or JSON depending on the file extension
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if path.ends_with(".toml") {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!("Config file {} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save as TOML or JSON depending on the file extension
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        if path.ends_with(".toml") {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data.batch_size == 0 {
            anyhow::bail!("Batch size must be > 0");
        }
        if self.model.latent_dim <= 0 {
            anyhow::bail!("Latent dimension must be > 0");
        }
        if self.model.dim <= 0 || self.model.channels <= 0 {
            anyhow::bail!("Feature-map width and channel count must be > 0");
        }
        if self.model.image_size <= 0 || self.model.image_size % 8 != 0 {
            anyhow::bail!(
                "Image size must be a positive multiple of 8, got {}",
                self.model.image_size
            );
        }
        if self.training.iterations == 0 {
            anyhow::bail!("Number of iterations must be > 0");
        }
        if self.training.critic_iters == 0 {
            anyhow::bail!("Critic iterations must be > 0");
        }
        if self.training.gen_lr <= 0.0 || self.training.critic_lr <= 0.0 {
            anyhow::bail!("Learning rates must be > 0");
        }
        if self.training.report_every == 0 {
            anyhow::bail!("Report frequency must be > 0");
        }
        if self.training.sample_count <= 0 {
            anyhow::bail!("Sample count must be > 0");
        }
        self.training.penalty.validate()?;
        Ok(())
    }

    /// Build the model described by this configuration
    pub fn build_model(&self, device: tch::Device) -> Wgan {
        Wgan::with_dims(
            self.model.latent_dim,
            self.model.dim,
            self.model.channels,
            self.model.image_size,
            device,
        )
    }

    /// Trainer settings derived from this configuration
    pub fn training_config(&self) -> TrainingConfig {
        let t = &self.training;
        TrainingConfig {
            iterations: t.iterations,
            critic_iters: t.critic_iters,
            gen_adam: AdamParams {
                lr: t.gen_lr,
                beta1: t.beta1,
                beta2: t.beta2,
            },
            critic_adam: AdamParams {
                lr: t.critic_lr,
                beta1: t.beta1,
                beta2: t.beta2,
            },
            penalty: t.penalty,
            report_every: t.report_every,
            sample_count: t.sample_count,
            checkpoint_every: t.checkpoint_every,
            checkpoint_dir: t.checkpoint_dir.clone(),
            progress: true,
        }
    }
}
