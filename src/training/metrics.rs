//! Training metrics for monitoring WGAN progress
//!
//! Provides structures for tracking and logging training progress.

use std::collections::VecDeque;

/// Metrics collected during training, one entry per outer iteration
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Critic cost (fake - real + penalty) of the last critic step of each iteration
    pub critic_costs: Vec<f64>,
    /// Generator cost (-E[D(G(z))]) per iteration
    pub gen_costs: Vec<f64>,
    /// Wasserstein estimate (real - fake) of the last critic step of each iteration
    pub wasserstein: Vec<f64>,
    /// Gradient penalty of the last critic step of each iteration
    pub penalties: Vec<f64>,
    /// Wall-clock seconds spent per iteration
    pub iteration_secs: Vec<f64>,
    /// Held-out critic costs as (step, cost)
    pub held_out_costs: Vec<(usize, f64)>,
    /// Number of critic optimizer steps taken
    pub critic_steps: usize,
    /// Number of generator optimizer steps taken
    pub generator_steps: usize,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record iteration metrics
    pub fn record_iteration(
        &mut self,
        critic_cost: f64,
        gen_cost: f64,
        wasserstein: f64,
        penalty: f64,
        secs: f64,
    ) {
        self.critic_costs.push(critic_cost);
        self.gen_costs.push(gen_cost);
        self.wasserstein.push(wasserstein);
        self.penalties.push(penalty);
        self.iteration_secs.push(secs);
    }

    /// Count one critic optimizer step
    pub fn record_critic_step(&mut self) {
        self.critic_steps += 1;
    }

    /// Count one generator optimizer step
    pub fn record_generator_step(&mut self) {
        self.generator_steps += 1;
    }

    /// Record a held-out critic cost
    pub fn record_held_out(&mut self, step: usize, cost: f64) {
        self.held_out_costs.push((step, cost));
    }

    /// Get number of recorded iterations
    pub fn num_iterations(&self) -> usize {
        self.gen_costs.len()
    }

    /// Get latest generator cost
    pub fn latest_gen_cost(&self) -> Option<f64> {
        self.gen_costs.last().copied()
    }

    /// Get latest critic cost
    pub fn latest_critic_cost(&self) -> Option<f64> {
        self.critic_costs.last().copied()
    }

    /// Get latest held-out critic cost
    pub fn latest_held_out_cost(&self) -> Option<f64> {
        self.held_out_costs.last().map(|&(_, cost)| cost)
    }

    /// Calculate moving average of iteration time
    pub fn iteration_secs_ma(&self, window: usize) -> f64 {
        moving_average(&self.iteration_secs, window)
    }

    /// Check whether the latest costs are NaN or infinite
    pub fn has_diverged(&self) -> bool {
        [self.latest_critic_cost(), self.latest_gen_cost()]
            .iter()
            .flatten()
            .any(|v| !v.is_finite())
    }

    /// Save per-iteration metrics to CSV file
    pub fn save_csv(&self, path: &str) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record([
            "iteration",
            "critic_cost",
            "gen_cost",
            "wasserstein",
            "penalty",
            "secs",
        ])?;

        for i in 0..self.num_iterations() {
            writer.write_record([
                (i + 1).to_string(),
                self.critic_costs[i].to_string(),
                self.gen_costs[i].to_string(),
                self.wasserstein[i].to_string(),
                self.penalties[i].to_string(),
                self.iteration_secs[i].to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Save held-out critic costs to CSV file
    pub fn save_held_out_csv(&self, path: &str) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["step", "held_out_cost"])?;
        for (step, cost) in &self.held_out_costs {
            writer.write_record([step.to_string(), cost.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Replace held-out critic costs with those stored in a CSV file
    pub fn load_held_out_csv(&mut self, path: &str) -> anyhow::Result<()> {
        let mut reader = csv::Reader::from_path(path)?;
        self.held_out_costs.clear();
        for result in reader.records() {
            let record = result?;
            self.record_held_out(record[0].parse()?, record[1].parse()?);
        }
        Ok(())
    }

    /// Load per-iteration metrics from CSV file
    ///
    /// Step counters are rebuilt assuming `critic_iters` critic steps per iteration.
    pub fn load_csv(path: &str, critic_iters: usize) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut metrics = Self::new();

        for result in reader.records() {
            let record = result?;
            metrics.record_iteration(
                record[1].parse()?,
                record[2].parse()?,
                record[3].parse()?,
                record[4].parse()?,
                record[5].parse()?,
            );
        }

        metrics.generator_steps = metrics.num_iterations();
        metrics.critic_steps = metrics.num_iterations() * critic_iters;
        Ok(metrics)
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = window.min(values.len()).max(1);
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}

/// Mean and spread of the most recent values of a series
#[derive(Debug)]
pub struct RollingStats {
    window: VecDeque<f64>,
    capacity: usize,
}

impl RollingStats {
    /// Track at most `capacity` recent values
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a value, evicting the oldest once full
    pub fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Mean of the window, 0 when empty
    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Population standard deviation of the window, 0 below two values
    pub fn std(&self) -> f64 {
        let n = self.window.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sq_dev: f64 = self.window.iter().map(|v| (v - mean).powi(2)).sum();
        (sq_dev / n as f64).sqrt()
    }
}
