//! Action distributions produced by the actor head.
//!
//! - [`ActionDistribution::Categorical`]: one logit per discrete action
//! - [`ActionDistribution::DiagGaussian`]: independent Gaussian per action
//!   dimension with a state-independent `log_std`
//!
//! Actions travel as float tensors of shape `[batch, action_dim]`. Discrete
//! actions use `action_dim = 1` and store the index as a float.
//!
//! Gaussian actions are NOT squashed. The caller clips them into the action
//! space before stepping an environment, while the unclipped sample is kept
//! for the log-probability.

use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;

use super::parameters::tensor_values;
use crate::nn::standard_normal;
use crate::error::Result;

const LOG_STD_MIN: f32 = -20.0;
const LOG_STD_MAX: f32 = 2.0;

/// Distribution over actions for a batch of observations.
#[derive(Debug, Clone)]
pub enum ActionDistribution<B: Backend> {
    /// Categorical over `n` actions: logits [batch, n]
    Categorical { logits: Tensor<B, 2> },
    /// Diagonal Gaussian: mean and log_std, both [batch, action_dim]
    DiagGaussian {
        mean: Tensor<B, 2>,
        log_std: Tensor<B, 2>,
    },
}

impl<B: Backend> ActionDistribution<B> {
    /// Categorical distribution from unnormalized logits.
    pub fn categorical(logits: Tensor<B, 2>) -> Self {
        Self::Categorical { logits }
    }

    /// Diagonal Gaussian with one shared `log_std` [action_dim] for the batch.
    pub fn diag_gaussian(mean: Tensor<B, 2>, log_std: Tensor<B, 1>) -> Self {
        let log_std = mean.zeros_like() + log_std.clamp(LOG_STD_MIN, LOG_STD_MAX).unsqueeze_dim(0);
        Self::DiagGaussian { mean, log_std }
    }

    /// Number of rows in the batch.
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Categorical { logits } => logits.dims()[0],
            Self::DiagGaussian { mean, .. } => mean.dims()[0],
        }
    }

    /// Floats per action.
    pub fn action_dim(&self) -> usize {
        match self {
            Self::Categorical { .. } => 1,
            Self::DiagGaussian { mean, .. } => mean.dims()[1],
        }
    }

    /// Draw one action per row: [batch, action_dim].
    ///
    /// Every random draw comes from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Tensor<B, 2>> {
        match self {
            Self::Categorical { logits } => {
                let device = logits.device();
                let [batch_size, n_actions] = logits.dims();
                let probs = tensor_values(softmax(logits.clone(), 1))?;

                let mut actions = Vec::with_capacity(batch_size);
                for row in probs.chunks(n_actions) {
                    let u: f32 = rng.gen();
                    let mut cumsum = 0.0;
                    // Float rounding can leave the cumulative sum below 1.0
                    let mut selected = n_actions - 1;
                    for (a, &p) in row.iter().enumerate() {
                        cumsum += p;
                        if u < cumsum {
                            selected = a;
                            break;
                        }
                    }
                    actions.push(selected as f32);
                }

                Ok(Tensor::<B, 1>::from_floats(actions.as_slice(), &device)
                    .reshape([batch_size, 1]))
            }
            Self::DiagGaussian { mean, log_std } => {
                let [batch_size, action_dim] = mean.dims();
                let noise: Vec<f32> = (0..batch_size * action_dim)
                    .map(|_| standard_normal(rng) as f32)
                    .collect();
                let noise = Tensor::<B, 1>::from_floats(noise.as_slice(), &mean.device())
                    .reshape([batch_size, action_dim]);
                Ok(mean.clone() + log_std.clone().exp() * noise)
            }
        }
    }

    /// Most likely action per row: [batch, action_dim].
    pub fn mode(&self) -> Tensor<B, 2> {
        match self {
            Self::Categorical { logits } => logits.clone().argmax(1).float(),
            Self::DiagGaussian { mean, .. } => mean.clone(),
        }
    }

    /// Log-probability of `actions` [batch, action_dim], summed over
    /// action dimensions: [batch].
    pub fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Self::Categorical { logits } => {
                let log_probs = log_softmax(logits.clone(), 1);
                log_probs.gather(1, actions.int()).flatten(0, 1)
            }
            Self::DiagGaussian { mean, log_std } => {
                let log_2pi = (2.0 * std::f32::consts::PI).ln();
                let normalized = (actions - mean.clone()) / log_std.clone().exp();
                let per_dim: Tensor<B, 2> =
                    normalized.powf_scalar(2.0) * (-0.5) - log_std.clone() - 0.5 * log_2pi;
                per_dim.sum_dim(1).flatten(0, 1)
            }
        }
    }

    /// Entropy per row: [batch].
    pub fn entropy(&self) -> Tensor<B, 1> {
        match self {
            Self::Categorical { logits } => {
                let log_probs = log_softmax(logits.clone(), 1);
                let probs = log_probs.clone().exp();
                let neg_entropy: Tensor<B, 2> = (probs * log_probs).sum_dim(1);
                -neg_entropy.flatten(0, 1)
            }
            Self::DiagGaussian { log_std, .. } => {
                // H = 0.5 * D * (1 + log(2π)) + Σ log σ
                let action_dim = log_std.dims()[1] as f32;
                let log_2pi = (2.0 * std::f32::consts::PI).ln();
                let constant = 0.5 * action_dim * (1.0 + log_2pi);
                let sum_log_std: Tensor<B, 2> = log_std.clone().sum_dim(1);
                sum_log_std.flatten(0, 1).add_scalar(constant)
            }
        }
    }
}
