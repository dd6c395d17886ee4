//! Training loop implementation for WGAN-GP
//!
//! Each outer iteration runs several critic updates followed by one
//! generator update, and periodically reports held-out cost and samples.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tch::nn;
use tracing::{debug, info, warn};

use super::losses::{critic_loss, generator_loss, wasserstein_estimate};
use super::metrics::{RollingStats, TrainingMetrics};
use super::penalty::GradientPenalty;
use super::report::{MetricsSink, SampleReporter};
use crate::data::{DataLoader, SampleSource};
use crate::model::{parameter_norm, AdamParams, Wgan};
use crate::utils::save_checkpoint;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of outer (generator) iterations
    pub iterations: usize,
    /// Number of critic updates per generator update
    pub critic_iters: usize,
    /// Adam settings for the generator
    pub gen_adam: AdamParams,
    /// Adam settings for the critic
    pub critic_adam: AdamParams,
    /// Gradient penalty form
    pub penalty: GradientPenalty,
    /// Report held-out cost and samples every N iterations
    pub report_every: usize,
    /// Number of images in each sample report
    pub sample_count: i64,
    /// Save checkpoint every N iterations (0 disables periodic checkpoints)
    pub checkpoint_every: usize,
    /// Directory to save checkpoints
    pub checkpoint_dir: String,
    /// Whether to draw a progress bar
    pub progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: 200_000,
            critic_iters: 5,
            gen_adam: AdamParams::default(),
            critic_adam: AdamParams::default(),
            penalty: GradientPenalty::default(),
            report_every: 100,
            sample_count: 5,
            checkpoint_every: 10_000,
            checkpoint_dir: "checkpoints".to_string(),
            progress: true,
        }
    }
}

/// Values from one critic update
#[derive(Debug, Clone, Copy, Default)]
struct CriticStep {
    cost: f64,
    wasserstein: f64,
    penalty: f64,
}

/// WGAN-GP Trainer
pub struct Trainer {
    config: TrainingConfig,
    metrics: TrainingMetrics,
    start_iteration: usize,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            metrics: TrainingMetrics::new(),
            start_iteration: 0,
        }
    }

    /// Continue from a checkpoint: skip finished iterations and keep their metrics
    pub fn resume_from(&mut self, iteration: usize, metrics: TrainingMetrics) {
        self.start_iteration = iteration;
        self.metrics = metrics;
    }

    /// Train the WGAN model
    ///
    /// # Arguments
    ///
    /// * `model` - WGAN model to train
    /// * `source` - Endless source of real training batches
    /// * `held_out` - Loader over the held-out images used by reports
    /// * `sink` - Destination for held-out costs and sample images
    ///
    /// # Returns
    ///
    /// Training metrics
    pub fn train(
        &mut self,
        model: &mut Wgan,
        source: &mut SampleSource,
        held_out: &mut DataLoader,
        sink: &mut dyn MetricsSink,
    ) -> anyhow::Result<&TrainingMetrics> {
        let mut gen_opt = model.gen_optimizer(self.config.gen_adam)?;
        let mut critic_opt = model.critic_optimizer(self.config.critic_adam)?;

        let reporter =
            SampleReporter::new(model, self.config.sample_count, self.config.report_every);
        let batch_size = source.batch_size() as i64;

        info!(
            "Starting training at iteration {} of {}, {} critic steps per generator step",
            self.start_iteration, self.config.iterations, self.config.critic_iters
        );

        std::fs::create_dir_all(&self.config.checkpoint_dir)?;

        let pb = if self.config.progress {
            ProgressBar::new(self.config.iterations as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        pb.set_position(self.start_iteration as u64);

        let mut recent_wasserstein = RollingStats::new(100);

        for iteration in self.start_iteration..self.config.iterations {
            let started = Instant::now();

            let critic = self.critic_phase(model, source, &mut critic_opt)?;
            let gen_cost = self.generator_phase(model, batch_size, &mut gen_opt);

            self.metrics.record_iteration(
                critic.cost,
                gen_cost,
                critic.wasserstein,
                critic.penalty,
                started.elapsed().as_secs_f64(),
            );
            recent_wasserstein.push(critic.wasserstein);

            if self.metrics.has_diverged() {
                warn!("Non-finite cost at iteration {}", iteration);
            }

            if reporter.should_report(iteration) {
                let cost = reporter.report(iteration, model, held_out, sink)?;
                self.metrics.record_held_out(iteration + 1, cost);
                info!(
                    "Iteration {}/{}: D_cost={:.4}, G_cost={:.4}, W_dist={:.4} (std {:.4}), {:.3}s/iter",
                    iteration + 1,
                    self.config.iterations,
                    critic.cost,
                    gen_cost,
                    recent_wasserstein.mean(),
                    recent_wasserstein.std(),
                    self.metrics.iteration_secs_ma(self.config.report_every)
                );
                debug!(
                    "Parameter norms: generator {:.4}, critic {:.4}",
                    parameter_norm(&model.gen_vs),
                    parameter_norm(&model.critic_vs)
                );
            }

            let every = self.config.checkpoint_every;
            if every > 0 && (iteration + 1) % every == 0 {
                let dir = &self.config.checkpoint_dir;
                if let Err(e) = save_checkpoint(model, &self.metrics, iteration + 1, dir) {
                    warn!("Failed to save checkpoint: {}", e);
                }
            }

            pb.set_message(format!("D: {:.4}, G: {:.4}", critic.cost, gen_cost));
            pb.inc(1);
        }

        pb.finish_with_message("done");
        info!(
            "Finished after {} passes over the training images",
            source.passes()
        );

        let final_iteration = self.config.iterations.max(self.start_iteration);
        save_checkpoint(model, &self.metrics, final_iteration, &self.config.checkpoint_dir)?;

        Ok(&self.metrics)
    }

    /// Run `critic_iters` critic updates with the critic unfrozen
    ///
    /// Generated images are produced without gradient tracking, so no
    /// gradient reaches the generator.
    fn critic_phase(
        &mut self,
        model: &mut Wgan,
        source: &mut SampleSource,
        critic_opt: &mut nn::Optimizer,
    ) -> anyhow::Result<CriticStep> {
        model.unfreeze_critic();

        let mut last = CriticStep::default();
        for _ in 0..self.config.critic_iters {
            let real = source.next_tensor()?;
            let batch_size = real.size()[0];

            let real_output = model.score(&real);

            let noise = model.sample_noise(batch_size);
            let fake = model.generate_from_noise(&noise);
            let fake_output = model.score(&fake);

            let penalty = self.config.penalty.compute(&model.critic, &real, &fake);
            let cost = critic_loss(&real_output, &fake_output) + &penalty;

            critic_opt.zero_grad();
            cost.backward();
            critic_opt.step();
            self.metrics.record_critic_step();

            last = CriticStep {
                cost: cost.double_value(&[]),
                wasserstein: wasserstein_estimate(&real_output, &fake_output),
                penalty: penalty.double_value(&[]),
            };
        }

        Ok(last)
    }

    /// Run one generator update with the critic frozen
    ///
    /// Returns the generator cost.
    fn generator_phase(
        &mut self,
        model: &mut Wgan,
        batch_size: i64,
        gen_opt: &mut nn::Optimizer,
    ) -> f64 {
        model.freeze_critic();

        let noise = model.sample_noise(batch_size);
        let fake = model.generator.forward_t(&noise, true);
        let cost = generator_loss(&model.score(&fake));

        gen_opt.zero_grad();
        cost.backward();
        gen_opt.step();
        self.metrics.record_generator_step();

        cost.double_value(&[])
    }
}
