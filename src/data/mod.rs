//! Data module for loading and batching image data
//!
//! This module provides:
//! - CIFAR-10 loading into normalized in-memory partitions
//! - Image preprocessing and tensor conversion
//! - DataLoader for batching and an endless sample source

mod cifar;
mod loader;
mod preprocessing;

pub use cifar::ImageDataset;
pub use loader::{DataLoader, DataLoaderIter, SampleSource};
pub use preprocessing::{array_to_tensor, normalize_images, tensor_to_array, to_display_range};
