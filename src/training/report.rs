//! Periodic reporting of held-out critic cost and generated samples
//!
//! Records are keyed by step (iteration + 1) and written to a [`MetricsSink`].

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tch::{Kind, Tensor};
use tracing::{debug, info};

use super::losses::held_out_cost;
use crate::data::{array_to_tensor, to_display_range, DataLoader};
use crate::model::Wgan;

/// Tag of the held-out critic cost scalar
pub const HELD_OUT_COST_TAG: &str = "held_out_critic_cost";

/// Tag of the generated sample images
pub const SAMPLES_TAG: &str = "generated_samples";

/// Destination for scalar and image time series
pub trait MetricsSink {
    /// Record a scalar value at a step
    fn record_scalar(&mut self, tag: &str, step: usize, value: f64) -> anyhow::Result<()>;

    /// Record a batch of images in [0, 1], shape (N, C, H, W), at a step
    fn record_images(&mut self, tag: &str, step: usize, images: &Tensor) -> anyhow::Result<()>;
}

/// Writes scalars to `scalars.csv` and images as PNG grids under `<tag>/`
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Create a sink rooted at `dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the scalar CSV file
    pub fn scalars_path(&self) -> PathBuf {
        self.dir.join("scalars.csv")
    }

    /// Path of the image grid written for `tag` at `step`
    pub fn image_path(&self, tag: &str, step: usize) -> PathBuf {
        self.dir.join(tag).join(format!("step_{:07}.png", step))
    }
}

impl MetricsSink for FileSink {
    fn record_scalar(&mut self, tag: &str, step: usize, value: f64) -> anyhow::Result<()> {
        let path = self.scalars_path();
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(["tag", "step", "value"])?;
        }
        writer.write_record([tag.to_string(), step.to_string(), value.to_string()])?;
        writer.flush()?;
        Ok(())
    }

    fn record_images(&mut self, tag: &str, step: usize, images: &Tensor) -> anyhow::Result<()> {
        let path = self.image_path(tag, step);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tch::vision::image::save(&image_grid(images), &path)?;
        debug!("Saved {} images to {}", images.size()[0], path.display());
        Ok(())
    }
}

/// Keeps every record in memory
#[derive(Default)]
pub struct MemorySink {
    /// Scalars as (tag, step, value)
    pub scalars: Vec<(String, usize, f64)>,
    /// Image batches as (tag, step, images)
    pub images: Vec<(String, usize, Tensor)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for MemorySink {
    fn record_scalar(&mut self, tag: &str, step: usize, value: f64) -> anyhow::Result<()> {
        self.scalars.push((tag.to_string(), step, value));
        Ok(())
    }

    fn record_images(&mut self, tag: &str, step: usize, images: &Tensor) -> anyhow::Result<()> {
        self.images.push((tag.to_string(), step, images.copy()));
        Ok(())
    }
}

/// Lay out (N, C, H, W) images in [0, 1] side by side as a (C, H, N*W) uint8 image
pub fn image_grid(images: &Tensor) -> Tensor {
    let tiles = images.to_device(tch::Device::Cpu).unbind(0);
    let grid = Tensor::cat(&tiles, 2);
    (grid * 255.0).clamp(0.0, 255.0).to_kind(Kind::Uint8)
}

/// Whether `iteration` (0-based) ends a reporting period of length `every`
pub fn is_report_iteration(iteration: usize, every: usize) -> bool {
    every > 0 && iteration % every == every - 1
}

/// Average of `-E[D(x)]` over one full pass of the held-out loader
pub fn evaluate_held_out(model: &Wgan, held_out: &mut DataLoader) -> anyhow::Result<f64> {
    let mut costs = Vec::with_capacity(held_out.num_batches());

    for batch in held_out.iter() {
        let images = array_to_tensor(batch, model.device)?;
        let scores = tch::no_grad(|| model.score(&images));
        costs.push(held_out_cost(&scores));
    }

    if costs.is_empty() {
        anyhow::bail!("Held-out set yields no batches");
    }
    Ok(costs.iter().sum::<f64>() / costs.len() as f64)
}

/// Renders generator samples from a latent batch fixed at construction
pub struct SampleReporter {
    fixed_noise: Tensor,
    every: usize,
}

impl SampleReporter {
    /// Draw `sample_count` latent vectors once; they are reused for every report
    pub fn new(model: &Wgan, sample_count: i64, every: usize) -> Self {
        Self {
            fixed_noise: model.sample_noise(sample_count),
            every,
        }
    }

    /// Whether this iteration triggers a report
    pub fn should_report(&self, iteration: usize) -> bool {
        is_report_iteration(iteration, self.every)
    }

    /// Generator output for the fixed latent batch, rescaled to [0, 1]
    pub fn render_samples(&self, model: &Wgan) -> Tensor {
        let samples = model.generate_from_noise(&self.fixed_noise);
        to_display_range(&samples)
    }

    /// Evaluate the held-out cost and render samples, writing both at step `iteration + 1`
    ///
    /// Returns the held-out critic cost.
    pub fn report(
        &self,
        iteration: usize,
        model: &Wgan,
        held_out: &mut DataLoader,
        sink: &mut dyn MetricsSink,
    ) -> anyhow::Result<f64> {
        let step = iteration + 1;

        let cost = evaluate_held_out(model, held_out)?;
        sink.record_scalar(HELD_OUT_COST_TAG, step, cost)?;

        let samples = self.render_samples(model);
        sink.record_images(SAMPLES_TAG, step, &samples)?;

        info!("Step {}: held-out critic cost {:.4}", step, cost);
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use tch::Device;

    fn small_wgan() -> Wgan {
        Wgan::with_dims(16, 4, 3, 8, Device::Cpu)
    }

    #[test]
    fn test_report_schedule() {
        let triggered: Vec<usize> = (0..350).filter(|&i| is_report_iteration(i, 100)).collect();
        assert_eq!(triggered, vec![99, 199, 299]);

        assert!(!is_report_iteration(0, 100));
        assert!(!is_report_iteration(100, 100));
        assert!(is_report_iteration(0, 1));
        assert!(!is_report_iteration(5, 0));
    }

    #[test]
    fn test_image_grid() {
        let images = Tensor::ones([5, 3, 8, 8], (Kind::Float, Device::Cpu)) * 0.5;
        let grid = image_grid(&images);

        assert_eq!(grid.size(), vec![3, 8, 40]);
        assert_eq!(grid.kind(), Kind::Uint8);
        assert_eq!(grid.max().int64_value(&[]), 127);
    }

    #[test]
    fn test_evaluate_held_out() {
        let wgan = small_wgan();
        let data = Array4::<f32>::zeros((10, 3, 8, 8));
        let mut loader = DataLoader::new(data, 4, Some(0));

        // Identical images: every batch has the same cost
        let cost = evaluate_held_out(&wgan, &mut loader).unwrap();
        let zeros = Tensor::zeros([1, 3, 8, 8], (Kind::Float, Device::Cpu));
        let expected = -wgan.score(&zeros).double_value(&[0, 0]);
        assert!((cost - expected).abs() < 1e-5);
    }

    #[test]
    fn test_evaluate_held_out_requires_a_batch() {
        let wgan = small_wgan();
        let mut loader = DataLoader::new(Array4::<f32>::zeros((2, 3, 8, 8)), 4, None);
        assert!(evaluate_held_out(&wgan, &mut loader).is_err());
    }

    #[test]
    fn test_fixed_samples_and_range() {
        let wgan = small_wgan();
        let reporter = SampleReporter::new(&wgan, 5, 100);

        let first = reporter.render_samples(&wgan);
        let second = reporter.render_samples(&wgan);

        assert_eq!(first.size(), vec![5, 3, 8, 8]);
        assert!(first.min().double_value(&[]) >= 0.0);
        assert!(first.max().double_value(&[]) <= 1.0);
        // Same latent batch, unchanged weights: same images
        assert!(first.allclose(&second, 1e-5, 1e-6, false));
    }

    #[test]
    fn test_report_writes_to_sink() {
        let wgan = small_wgan();
        let reporter = SampleReporter::new(&wgan, 5, 100);
        let mut loader = DataLoader::new(Array4::<f32>::zeros((8, 3, 8, 8)), 4, None);
        let mut sink = MemorySink::new();

        let cost = reporter.report(99, &wgan, &mut loader, &mut sink).unwrap();

        assert_eq!(sink.scalars, vec![(HELD_OUT_COST_TAG.to_string(), 100, cost)]);
        assert_eq!(sink.images.len(), 1);
        assert_eq!(sink.images[0].0, SAMPLES_TAG);
        assert_eq!(sink.images[0].1, 100);
        assert_eq!(sink.images[0].2.size(), vec![5, 3, 8, 8]);
    }

    #[test]
    fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("run")).unwrap();

        sink.record_scalar(HELD_OUT_COST_TAG, 100, -0.5).unwrap();
        sink.record_scalar(HELD_OUT_COST_TAG, 200, -0.75).unwrap();

        let mut reader = csv::Reader::from_path(sink.scalars_path()).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][1], "200");
        assert_eq!(&rows[1][2], "-0.75");

        let images = Tensor::rand([5, 3, 8, 8], (Kind::Float, Device::Cpu));
        sink.record_images(SAMPLES_TAG, 100, &images).unwrap();
        assert!(sink.image_path(SAMPLES_TAG, 100).exists());
    }
}
