//! Loss functions for WGAN training
//!
//! Implements the Wasserstein costs for the generator and the critic.

use tch::{Kind, Tensor};

/// Wasserstein loss for generator
///
/// Generator loss: -E[D(G(z))]
///
/// # Arguments
///
/// * `fake_output` - Critic scores on generated images
///
/// # Returns
///
/// Scalar loss tensor
pub fn generator_loss(fake_output: &Tensor) -> Tensor {
    -fake_output.mean(Kind::Float)
}

/// Wasserstein loss for critic, without the gradient penalty
///
/// Critic loss: E[D(G(z))] - E[D(x)]
///
/// # Arguments
///
/// * `real_output` - Critic scores on real images
/// * `fake_output` - Critic scores on generated images
pub fn critic_loss(real_output: &Tensor, fake_output: &Tensor) -> Tensor {
    fake_output.mean(Kind::Float) - real_output.mean(Kind::Float)
}

/// Estimated Wasserstein distance: E[D(x)] - E[D(G(z))]
pub fn wasserstein_estimate(real_output: &Tensor, fake_output: &Tensor) -> f64 {
    (real_output.mean(Kind::Float) - fake_output.mean(Kind::Float)).double_value(&[])
}

/// Critic cost on held-out images: -E[D(x)]
pub fn held_out_cost(real_output: &Tensor) -> f64 {
    -real_output.mean(Kind::Float).double_value(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_generator_loss() {
        let fake_output = Tensor::from_slice(&[1.0f32, 3.0]).view([2, 1]);
        let loss = generator_loss(&fake_output);

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!((loss.double_value(&[]) + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_critic_loss() {
        let real_output = Tensor::full([4, 1], 3.0, (Kind::Float, Device::Cpu));
        let fake_output = Tensor::full([4, 1], -1.0, (Kind::Float, Device::Cpu));
        let loss = critic_loss(&real_output, &fake_output);

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!((loss.double_value(&[]) + 4.0).abs() < 1e-6);
        assert!((wasserstein_estimate(&real_output, &fake_output) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_held_out_cost() {
        let scores = Tensor::from_slice(&[0.5f32, 1.5]).view([2, 1]);
        assert!((held_out_cost(&scores) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_losses_are_differentiable() {
        let scores = Tensor::randn([4, 1], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        let loss = generator_loss(&scores);
        loss.backward();

        // d(-mean)/dx = -1/n
        let grad = scores.grad();
        assert!((grad.mean(Kind::Float).double_value(&[]) + 0.25).abs() < 1e-6);
    }
}
