//! Training module for WGAN-GP
//!
//! This module provides:
//! - Training loop implementation
//! - Wasserstein losses and the gradient penalty
//! - Periodic held-out evaluation and sample reporting
//! - Training metrics

mod losses;
mod metrics;
mod penalty;
mod report;
mod trainer;

pub use losses::{critic_loss, generator_loss, held_out_cost, wasserstein_estimate};
pub use metrics::{RollingStats, TrainingMetrics};
pub use penalty::{gradient_norms, interpolate, mixing_weights, GradientPenalty};
pub use report::{
    evaluate_held_out, image_grid, is_report_iteration, FileSink, MemorySink, MetricsSink,
    SampleReporter, HELD_OUT_COST_TAG, SAMPLES_TAG,
};
pub use trainer::{Trainer, TrainingConfig};
