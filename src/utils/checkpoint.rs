//! Checkpoint save/load utilities
//!
//! Provides functions for saving and loading model checkpoints
//! along with training state.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::config::ModelConfig;
use crate::model::Wgan;
use crate::training::TrainingMetrics;

const CHECKPOINT_PREFIX: &str = "checkpoint_iter_";

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Number of completed iterations
    pub iteration: usize,
    /// Critic cost of the last iteration
    pub critic_cost: f64,
    /// Generator cost of the last iteration
    pub gen_cost: f64,
    /// Timestamp of checkpoint
    pub timestamp: String,
    /// Dimensions needed to rebuild the networks
    pub model: ModelConfig,
}

impl CheckpointMeta {
    /// Build a model with the stored dimensions
    pub fn build_model(&self, device: tch::Device) -> Wgan {
        Wgan::with_dims(
            self.model.latent_dim,
            self.model.dim,
            self.model.channels,
            self.model.image_size,
            device,
        )
    }
}

/// Save a complete checkpoint (model + metadata)
///
/// # Arguments
///
/// * `model` - WGAN model to save
/// * `metrics` - Training metrics
/// * `iteration` - Number of completed iterations
/// * `dir` - Directory to save checkpoint
///
/// # Returns
///
/// Path to saved checkpoint
pub fn save_checkpoint(
    model: &Wgan,
    metrics: &TrainingMetrics,
    iteration: usize,
    dir: &str,
) -> anyhow::Result<String> {
    let checkpoint_dir = Path::new(dir).join(format!("{}{:07}", CHECKPOINT_PREFIX, iteration));
    std::fs::create_dir_all(&checkpoint_dir)?;
    let checkpoint_dir = checkpoint_dir.to_string_lossy().to_string();

    let gen_path = format!("{}/generator.pt", checkpoint_dir);
    let critic_path = format!("{}/critic.pt", checkpoint_dir);
    model.save(&gen_path, &critic_path)?;

    let meta = CheckpointMeta {
        iteration,
        critic_cost: metrics.latest_critic_cost().unwrap_or(0.0),
        gen_cost: metrics.latest_gen_cost().unwrap_or(0.0),
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: ModelConfig {
            latent_dim: model.latent_dim(),
            dim: model.dim(),
            channels: model.channels(),
            image_size: model.image_size(),
        },
    };

    let meta_path = format!("{}/meta.json", checkpoint_dir);
    std::fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)?;

    let metrics_path = format!("{}/metrics.csv", checkpoint_dir);
    metrics.save_csv(&metrics_path)?;

    let held_out_path = format!("{}/held_out.csv", checkpoint_dir);
    metrics.save_held_out_csv(&held_out_path)?;

    tracing::info!("Saved checkpoint to {}", checkpoint_dir);
    Ok(checkpoint_dir)
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(checkpoint_dir: &str) -> anyhow::Result<CheckpointMeta> {
    let meta_path = format!("{}/meta.json", checkpoint_dir);
    let content = std::fs::read_to_string(&meta_path)?;
    let meta: CheckpointMeta = serde_json::from_str(&content)?;
    Ok(meta)
}

/// Load a complete checkpoint
///
/// # Arguments
///
/// * `model` - WGAN model to load weights into
/// * `checkpoint_dir` - Directory containing checkpoint
/// * `critic_iters` - Critic steps per iteration, used to rebuild step counters
///
/// # Returns
///
/// Tuple of (iteration, metrics)
pub fn load_checkpoint(
    model: &mut Wgan,
    checkpoint_dir: &str,
    critic_iters: usize,
) -> anyhow::Result<(usize, TrainingMetrics)> {
    let meta = load_checkpoint_meta(checkpoint_dir)?;
    if meta.model.latent_dim != model.latent_dim() || meta.model.image_size != model.image_size() {
        anyhow::bail!(
            "Checkpoint {} was saved for latent_dim={}, image_size={}; model has {}, {}",
            checkpoint_dir,
            meta.model.latent_dim,
            meta.model.image_size,
            model.latent_dim(),
            model.image_size()
        );
    }

    let gen_path = format!("{}/generator.pt", checkpoint_dir);
    let critic_path = format!("{}/critic.pt", checkpoint_dir);
    model.load(&gen_path, &critic_path)?;

    let metrics_path = format!("{}/metrics.csv", checkpoint_dir);
    let mut metrics = if Path::new(&metrics_path).exists() {
        TrainingMetrics::load_csv(&metrics_path, critic_iters)?
    } else {
        TrainingMetrics::new()
    };

    let held_out_path = format!("{}/held_out.csv", checkpoint_dir);
    if Path::new(&held_out_path).exists() {
        metrics.load_held_out_csv(&held_out_path)?;
    }

    tracing::info!(
        "Loaded checkpoint from {} (iteration {})",
        checkpoint_dir,
        meta.iteration
    );
    Ok((meta.iteration, metrics))
}

/// Find the latest checkpoint in a directory
pub fn find_latest_checkpoint(dir: &str) -> Option<String> {
    list_checkpoints(dir).pop().map(|(path, _)| path)
}

/// List all readable checkpoints in a directory, oldest first
pub fn list_checkpoints(dir: &str) -> Vec<(String, CheckpointMeta)> {
    let mut checkpoints: Vec<_> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with(CHECKPOINT_PREFIX))
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let path = e.path().to_string_lossy().to_string();
            load_checkpoint_meta(&path).ok().map(|meta| (path, meta))
        })
        .collect();

    checkpoints.sort_by_key(|(_, meta)| meta.iteration);
    checkpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind, Tensor};

    fn small_wgan() -> Wgan {
        Wgan::with_dims(16, 4, 3, 8, Device::Cpu)
    }

    #[test]
    fn test_checkpoint_meta_serialization() {
        let meta = CheckpointMeta {
            iteration: 10_000,
            critic_cost: -2.5,
            gen_cost: 1.25,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            model: ModelConfig {
                latent_dim: 128,
                dim: 128,
                channels: 3,
                image_size: 32,
            },
        };

        let json = serde_json::to_string(&meta).unwrap();
        let loaded: CheckpointMeta = serde_json::from_str(&json).unwrap();

        assert_eq!(meta.iteration, loaded.iteration);
        assert_eq!(loaded.model.image_size, 32);
    }

    #[test]
    fn test_save_and_load_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        let wgan = small_wgan();
        let mut metrics = TrainingMetrics::new();
        metrics.record_iteration(-1.5, 0.8, 1.6, 0.1, 0.02);
        metrics.record_iteration(-1.25, 0.75, 1.4, 0.15, 0.03);
        metrics.record_held_out(2, -0.5);

        let path = save_checkpoint(&wgan, &metrics, 2, dir_str).unwrap();
        assert!(path.ends_with("checkpoint_iter_0000002"));
        let files = ["generator.pt", "critic.pt", "meta.json", "metrics.csv", "held_out.csv"];
        for file in files {
            assert!(Path::new(&path).join(file).exists());
        }

        let meta = load_checkpoint_meta(&path).unwrap();
        assert_eq!(meta.iteration, 2);
        assert_eq!(meta.critic_cost, -1.25);
        assert_eq!(meta.model.dim, 4);

        let mut restored = meta.build_model(Device::Cpu);
        let (iteration, loaded) = load_checkpoint(&mut restored, &path, 5).unwrap();
        assert_eq!(iteration, 2);
        assert_eq!(loaded.num_iterations(), 2);
        assert_eq!(loaded.critic_steps, 10);
        assert_eq!(loaded.latest_held_out_cost(), Some(-0.5));

        let images = Tensor::rand([2, 3, 8, 8], (Kind::Float, Device::Cpu));
        assert!(wgan.score(&images).allclose(&restored.score(&images), 1e-6, 1e-6, false));
    }

    #[test]
    fn test_load_rejects_mismatched_model() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        let path = save_checkpoint(&small_wgan(), &TrainingMetrics::new(), 1, dir_str).unwrap();
        let mut other = Wgan::with_dims(16, 4, 3, 16, Device::Cpu);
        assert!(load_checkpoint(&mut other, &path, 5).is_err());
    }

    #[test]
    fn test_find_latest_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        assert!(find_latest_checkpoint(dir_str).is_none());
        assert!(find_latest_checkpoint("/nonexistent/checkpoints").is_none());

        let wgan = small_wgan();
        let metrics = TrainingMetrics::new();
        for iteration in [900, 10_000, 2_000] {
            save_checkpoint(&wgan, &metrics, iteration, dir_str).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("unrelated")).unwrap();
        // Interrupted save without metadata is skipped
        std::fs::create_dir_all(dir.path().join("checkpoint_iter_0099999")).unwrap();

        let latest = find_latest_checkpoint(dir_str).unwrap();
        assert!(latest.ends_with("checkpoint_iter_0010000"));

        let iterations: Vec<usize> = list_checkpoints(dir_str)
            .iter()
            .map(|(_, meta)| meta.iteration)
            .collect();
        assert_eq!(iterations, vec![900, 2_000, 10_000]);
    }
}
