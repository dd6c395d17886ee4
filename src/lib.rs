//! # WGAN-GP for CIFAR-10
//!
//! This crate trains a Wasserstein GAN with gradient penalty on CIFAR-10
//! images: a generator mapping 128-d Gaussian noise to 32x32 RGB images and a
//! convolutional critic scoring images with an unbounded real number.
//!
//! ## Modules
//!
//! - `data`: CIFAR-10 loading, normalization and the endless batch source
//! - `model`: Generator and Critic networks with the WGAN wrapper
//! - `training`: Training loop, losses, gradient penalty and reporting
//! - `utils`: Configuration and checkpoints

pub mod data;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{DataLoader, ImageDataset, SampleSource};
pub use model::{Critic, Generator, Wgan};
pub use training::{
    FileSink, GradientPenalty, MetricsSink, Trainer, TrainingConfig, TrainingMetrics,
};
pub use utils::{load_checkpoint, save_checkpoint, Config};
