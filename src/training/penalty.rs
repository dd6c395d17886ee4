//! Gradient penalty for the WGAN critic
//!
//! Measures the critic's input gradient along random interpolations between
//! real and generated images and penalizes its norm.

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use crate::model::Critic;

/// Gradient penalty: `scale * mean((||grad|| - target)^power)`
///
/// The default (target 0, power 6, scale 2) is the form this project has
/// always trained with. It is not the penalty from the WGAN-GP paper, which
/// is available as [`GradientPenalty::standard`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientPenalty {
    /// Norm value the penalty pulls toward
    pub target: f64,
    /// Exponent applied to the norm deviation
    pub power: f64,
    /// Multiplier applied to the batch mean
    pub scale: f64,
}

impl Default for GradientPenalty {
    fn default() -> Self {
        Self {
            target: 0.0,
            power: 6.0,
            scale: 2.0,
        }
    }
}

impl GradientPenalty {
    /// Paper form: `lambda * mean((||grad|| - 1)^2)`
    pub fn standard(lambda: f64) -> Self {
        Self {
            target: 1.0,
            power: 2.0,
            scale: lambda,
        }
    }

    /// Reject settings that make the penalty undefined
    ///
    /// Norms below `target` give negative deviations, which only integer
    /// powers can raise without producing NaN.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.scale.is_finite() || self.scale < 0.0 {
            anyhow::bail!("Penalty scale must be finite and >= 0, got {}", self.scale);
        }
        if !self.target.is_finite() {
            anyhow::bail!("Penalty target must be finite, got {}", self.target);
        }
        if !self.power.is_finite() || self.power <= 0.0 {
            anyhow::bail!("Penalty power must be finite and > 0, got {}", self.power);
        }
        if self.target > 0.0 && self.power.fract() != 0.0 {
            anyhow::bail!(
                "Penalty power must be an integer when target > 0, got {}",
                self.power
            );
        }
        Ok(())
    }

    /// Compute the penalty between equally shaped real and fake batches
    ///
    /// The result stays attached to the critic's graph, so calling
    /// `backward` on it accumulates gradients into the critic parameters.
    pub fn compute(&self, critic: &Critic, real: &Tensor, fake: &Tensor) -> Tensor {
        let alpha = mixing_weights(real.size()[0], real);
        self.compute_with_weights(critic, real, fake, &alpha)
    }

    /// Compute the penalty with caller-provided mixing weights of shape (B, 1, 1, 1)
    pub fn compute_with_weights(
        &self,
        critic: &Critic,
        real: &Tensor,
        fake: &Tensor,
        alpha: &Tensor,
    ) -> Tensor {
        let interpolates = interpolate(real, fake, alpha);
        let norms = gradient_norms(critic, &interpolates);
        self.from_norms(&norms)
    }

    /// Apply the penalty formula to per-example gradient norms
    pub fn from_norms(&self, norms: &Tensor) -> Tensor {
        (norms - self.target)
            .pow_tensor_scalar(self.power)
            .mean(norms.kind())
            * self.scale
    }
}

/// One U[0, 1] weight per example, shaped (B, 1, 1, 1) to broadcast over pixels
///
/// Kind and device follow `like`.
pub fn mixing_weights(batch_size: i64, like: &Tensor) -> Tensor {
    Tensor::rand([batch_size, 1, 1, 1], (like.kind(), like.device()))
}

/// Per-example convex combination `alpha * real + (1 - alpha) * fake`
///
/// Returned as a fresh leaf that requires gradient; nothing flows back
/// into `real` or `fake`.
pub fn interpolate(real: &Tensor, fake: &Tensor, alpha: &Tensor) -> Tensor {
    let mixed = alpha * real.detach() + (alpha.ones_like() - alpha) * fake.detach();
    mixed.detach().set_requires_grad(true)
}

/// Euclidean norm of d(sum of critic scores)/d(input), one value per example
///
/// The gradient graph is kept and differentiable so that a penalty built on
/// these norms can itself be backpropagated.
pub fn gradient_norms(critic: &Critic, inputs: &Tensor) -> Tensor {
    let scores = critic.forward(inputs);
    let grads = Tensor::run_backward(&[scores.sum(scores.kind())], &[inputs], true, true);
    let batch_size = inputs.size()[0];
    grads[0].view([batch_size, -1]).norm_scalaropt_dim(2, [1], false)
}
