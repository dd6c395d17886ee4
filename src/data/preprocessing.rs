//! Image preprocessing utilities for GAN training
//!
//! This module provides functions for:
//! - Normalizing pixel data to [-1, 1] range (required for a generator with tanh output)
//! - Mapping generator output back to the [0, 1] display range
//! - Converting between ndarray image batches and tensors

use ndarray::{Array4, ArrayD, Ix4};
use tch::{Device, Kind, Tensor};

/// Per-channel mean subtracted during normalization
pub const PIXEL_MEAN: f32 = 0.5;

/// Per-channel standard deviation divided during normalization
pub const PIXEL_STD: f32 = 0.5;

/// Normalize images from [0, 1] to [-1, 1]
///
/// Formula: x_norm = (x - 0.5) / 0.5
///
/// # Arguments
///
/// * `images` - 4D array of shape (num_images, channels, height, width) in [0, 1]
pub fn normalize_images(images: &Array4<f32>) -> Array4<f32> {
    images.mapv(|v| (v - PIXEL_MEAN) / PIXEL_STD)
}

/// Rescale generator output from [-1, 1] to the [0, 1] display range
pub fn to_display_range(samples: &Tensor) -> Tensor {
    samples * PIXEL_STD as f64 + PIXEL_MEAN as f64
}

/// Convert an image tensor of shape (N, C, H, W) into a 4D ndarray
pub fn tensor_to_array(images: &Tensor) -> anyhow::Result<Array4<f32>> {
    let images = images.to_kind(Kind::Float).to_device(Device::Cpu);
    let array: ArrayD<f32> = (&images).try_into()?;
    Ok(array.into_dimensionality::<Ix4>()?)
}

/// Convert a 4D ndarray batch into a float tensor on `device`
pub fn array_to_tensor(batch: Array4<f32>, device: Device) -> anyhow::Result<Tensor> {
    let tensor = Tensor::try_from(batch)?;
    Ok(tensor.to_device(device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_normalize_images() {
        let images = Array4::from_shape_fn((2, 3, 4, 4), |(n, c, h, w)| {
            ((n + c + h + w) % 5) as f32 / 4.0
        });

        let normalized = normalize_images(&images);
        for val in normalized.iter() {
            assert!(*val >= -1.0 && *val <= 1.0);
        }
        assert_eq!(normalized[[0, 0, 0, 0]], -1.0);
        assert_eq!(normalized[[0, 0, 0, 2]], 0.0);
        assert_eq!(normalized[[0, 0, 1, 3]], 1.0);
    }

    #[test]
    fn test_display_range() {
        let samples = Tensor::from_slice(&[-1.0f32, 0.0, 1.0]);
        let display = to_display_range(&samples);
        let values: Vec<f32> = Vec::<f32>::try_from(&display).unwrap();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_array_tensor_conversion() {
        let batch = Array4::from_shape_fn((2, 3, 8, 8), |(n, c, _, _)| (n * 3 + c) as f32);
        let tensor = array_to_tensor(batch.clone(), Device::Cpu).unwrap();
        assert_eq!(tensor.size(), vec![2, 3, 8, 8]);
        assert_eq!(tensor.kind(), Kind::Float);

        let back = tensor_to_array(&tensor).unwrap();
        assert_eq!(back, batch);
    }
}
