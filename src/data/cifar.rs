//! CIFAR-10 image dataset
//!
//! Loads the binary version of CIFAR-10 (`data_batch_{1..5}.bin`, `test_batch.bin`)
//! through `tch::vision::cifar` and keeps both partitions in memory as
//! normalized ndarray image batches. Class labels are not used for GAN training.

use std::path::Path;

use ndarray::{Array4, Axis};
use tracing::info;

use super::preprocessing::{normalize_images, tensor_to_array};

/// Training and held-out image partitions
#[derive(Debug, Clone)]
pub struct ImageDataset {
    /// Training images of shape (num_images, channels, height, width) in [-1, 1]
    train: Array4<f32>,
    /// Held-out images of shape (num_images, channels, height, width) in [-1, 1]
    test: Array4<f32>,
}

impl ImageDataset {
    /// Load CIFAR-10 from a directory holding the binary batch files
    pub fn load_cifar10<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            anyhow::bail!("CIFAR-10 directory not found: {}", dir.display());
        }

        info!("Loading CIFAR-10 from {}", dir.display());
        let raw = tch::vision::cifar::load_dir(dir)?;

        let train = normalize_images(&tensor_to_array(&raw.train_images)?);
        let test = normalize_images(&tensor_to_array(&raw.test_images)?);

        let dataset = Self::from_arrays(train, test)?;
        info!(
            "Loaded {} training and {} held-out images",
            dataset.train_len(),
            dataset.test_len()
        );
        Ok(dataset)
    }

    /// Build a dataset from already normalized image arrays
    ///
    /// Both partitions must share the same (channels, height, width) shape.
    pub fn from_arrays(train: Array4<f32>, test: Array4<f32>) -> anyhow::Result<Self> {
        if train.shape()[1..] != test.shape()[1..] {
            anyhow::bail!(
                "Image shape mismatch between partitions: train {:?}, test {:?}",
                &train.shape()[1..],
                &test.shape()[1..]
            );
        }
        Ok(Self { train, test })
    }

    /// Number of training images
    pub fn train_len(&self) -> usize {
        self.train.len_of(Axis(0))
    }

    /// Number of held-out images
    pub fn test_len(&self) -> usize {
        self.test.len_of(Axis(0))
    }

    /// Image shape as (channels, height, width)
    pub fn image_shape(&self) -> (usize, usize, usize) {
        let shape = self.train.shape();
        (shape[1], shape[2], shape[3])
    }

    /// Split into (train, test) arrays
    pub fn into_partitions(self) -> (Array4<f32>, Array4<f32>) {
        (self.train, self.test)
    }
}
