//! DataLoader for batching and iterating over image data
//!
//! Provides batching for GAN training with support for:
//! - Random shuffling (seedable)
//! - Full batches only, with a different leftover each pass
//! - An endless sample source that restarts and reshuffles after every pass

use ndarray::{Array4, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tch::{Device, Tensor};
use tracing::debug;

use super::preprocessing::array_to_tensor;

/// DataLoader for iterating over batched images
///
/// Every pass visits the images in a fresh random order and yields only
/// full batches; the images left over change from pass to pass.
pub struct DataLoader {
    /// Full dataset of shape (num_images, channels, height, width)
    data: Array4<f32>,
    /// Batch size
    batch_size: usize,
    /// Current indices for iteration
    indices: Vec<usize>,
    /// Current position in iteration
    current_idx: usize,
    rng: StdRng,
}

impl DataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `data` - 4D array of shape (num_images, channels, height, width)
    /// * `batch_size` - Number of images per batch
    /// * `seed` - Shuffle seed, entropy-seeded when `None`
    pub fn new(data: Array4<f32>, batch_size: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let indices: Vec<usize> = (0..data.len_of(Axis(0))).collect();

        let mut loader = Self {
            data,
            batch_size: batch_size.max(1),
            indices,
            current_idx: 0,
            rng,
        };
        loader.shuffle_indices();
        loader
    }

    /// Get the number of batches per pass
    pub fn num_batches(&self) -> usize {
        self.num_samples() / self.batch_size
    }

    /// Get total number of images
    pub fn num_samples(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Get batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shuffle indices for a new pass
    fn shuffle_indices(&mut self) {
        self.indices.shuffle(&mut self.rng);
    }

    /// Reset for a new pass
    pub fn reset(&mut self) {
        self.current_idx = 0;
        self.shuffle_indices();
    }

    /// Get next batch
    ///
    /// Returns None when no full batch remains in the pass
    pub fn next_batch(&mut self) -> Option<Array4<f32>> {
        let start = self.current_idx;
        let end = start + self.batch_size;
        if end > self.indices.len() {
            return None;
        }

        let (_, channels, height, width) = self.data.dim();
        let mut batch = Array4::<f32>::zeros((self.batch_size, channels, height, width));

        for (batch_idx, &data_idx) in self.indices[start..end].iter().enumerate() {
            batch
                .index_axis_mut(Axis(0), batch_idx)
                .assign(&self.data.index_axis(Axis(0), data_idx));
        }

        self.current_idx = end;
        Some(batch)
    }

    /// Iterate over all batches of one pass, starting from a fresh shuffle
    pub fn iter(&mut self) -> DataLoaderIter<'_> {
        self.reset();
        DataLoaderIter { loader: self }
    }
}

/// Iterator adapter for DataLoader
pub struct DataLoaderIter<'a> {
    loader: &'a mut DataLoader,
}

impl<'a> Iterator for DataLoaderIter<'a> {
    type Item = Array4<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_batch()
    }
}

/// Endless source of real image batches
///
/// Cycles over the wrapped loader forever, reshuffling at the start of
/// every full pass. The sequence never terminates.
pub struct SampleSource {
    loader: DataLoader,
    device: Device,
    passes: usize,
}

impl SampleSource {
    /// Wrap a loader into an endless batch source
    ///
    /// Fails if the loader cannot produce a single batch, which would
    /// otherwise make the source spin without yielding.
    pub fn new(loader: DataLoader, device: Device) -> anyhow::Result<Self> {
        if loader.num_batches() == 0 {
            anyhow::bail!(
                "Not enough images ({}) for batch size ({})",
                loader.num_samples(),
                loader.batch_size()
            );
        }
        Ok(Self {
            loader,
            device,
            passes: 0,
        })
    }

    /// Number of completed passes over the underlying dataset
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Batch size of every yielded batch
    pub fn batch_size(&self) -> usize {
        self.loader.batch_size()
    }

    /// Next batch as a float tensor on the source's device
    pub fn next_tensor(&mut self) -> anyhow::Result<Tensor> {
        let batch = self.next_array();
        array_to_tensor(batch, self.device)
    }

    fn next_array(&mut self) -> Array4<f32> {
        loop {
            if let Some(batch) = self.loader.next_batch() {
                return batch;
            }
            self.passes += 1;
            debug!("Sample source finished pass {}, reshuffling", self.passes);
            self.loader.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Images whose every pixel holds the image index
    fn indexed_images(n: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, 3, 4, 4), |(i, _, _, _)| i as f32)
    }

    fn batch_ids(batch: &Array4<f32>) -> Vec<usize> {
        (0..batch.len_of(Axis(0)))
            .map(|i| batch[[i, 0, 0, 0]] as usize)
            .collect()
    }

    #[test]
    fn test_dataloader_full_batches_only() {
        let mut loader = DataLoader::new(indexed_images(10), 3, Some(0));

        assert_eq!(loader.num_batches(), 3); // floor(10/3) = 3
        assert_eq!(loader.num_samples(), 10);

        let batches: Vec<_> = loader.iter().collect();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.shape() == [3, 3, 4, 4]));
        assert!(loader.next_batch().is_none());
    }

    #[test]
    fn test_shuffled_pass_covers_every_image() {
        let mut loader = DataLoader::new(indexed_images(12), 4, Some(7));

        let mut seen: Vec<usize> = loader.iter().flat_map(|b| batch_ids(&b)).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_dropped_images_vary_across_passes() {
        // 10 images in batches of 4: two images sit out each pass
        let mut loader = DataLoader::new(indexed_images(10), 4, Some(5));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let pass: Vec<usize> = loader.iter().flat_map(|b| batch_ids(&b)).collect();
            assert_eq!(pass.len(), 8);
            seen.extend(pass);
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let mut a = DataLoader::new(indexed_images(16), 4, Some(42));
        let mut b = DataLoader::new(indexed_images(16), 4, Some(42));

        let first: Vec<_> = a.iter().flat_map(|x| batch_ids(&x)).collect();
        let second: Vec<_> = b.iter().flat_map(|x| batch_ids(&x)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_source_never_ends() {
        let loader = DataLoader::new(indexed_images(10), 4, Some(1));
        let mut source = SampleSource::new(loader, Device::Cpu).unwrap();

        // 2 full batches per pass, so 7 batches span 4 passes
        let batches: Vec<_> = (0..7).map(|_| source.next_array()).collect();
        assert!(batches.iter().all(|b| b.shape()[0] == 4));
        assert_eq!(source.passes(), 3);
    }

    #[test]
    fn test_sample_source_reshuffles_each_pass() {
        let loader = DataLoader::new(indexed_images(64), 64, Some(3));
        let mut source = SampleSource::new(loader, Device::Cpu).unwrap();

        let orders: Vec<Vec<usize>> = (0..4).map(|_| batch_ids(&source.next_array())).collect();
        for order in &orders {
            let mut sorted = order.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..64).collect::<Vec<_>>());
        }
        assert!(orders.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_sample_source_rejects_tiny_dataset() {
        let loader = DataLoader::new(indexed_images(3), 4, None);
        assert!(SampleSource::new(loader, Device::Cpu).is_err());
    }

    #[test]
    fn test_sample_source_tensor() {
        let loader = DataLoader::new(indexed_images(8), 4, None);
        let mut source = SampleSource::new(loader, Device::Cpu).unwrap();

        let batch = source.next_tensor().unwrap();
        assert_eq!(batch.size(), vec![4, 3, 4, 4]);
    }
}
