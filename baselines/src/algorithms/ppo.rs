//! Proximal Policy Optimization.
//!
//! Each iteration collects `n_steps` steps from every environment, then runs
//! `n_epochs` passes of shuffled minibatches over the rollout minimizing
//!
//! ```text
//! L = -min(r·A, clip(r, 1-ε, 1+ε)·A) + vf_coef·(R - V)² - ent_coef·H
//! ```
//!
//! with `r = π(a|s) / π_old(a|s)`. The value prediction can be clipped
//! around the rollout value (`clip_range_vf`) and an epoch is cut short once
//! the approximate KL exceeds `1.5 · target_kl`.

use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::base::{
    check_positive, create_adam, mean, run_learning, scalar, BaseRLModel, LearnOptions,
    OnPolicyCore, OnPolicySettings, PolicyOptimizer, TrainStats,
};
use crate::archive::ArchiveData;
use crate::buffers::{explained_variance, normalize_advantages};
use crate::envs::VecEnv;
use crate::error::{ConfigError, Result};
use crate::policies::PolicyConfig;
use crate::schedules::Schedule;

// ============================================================================
// Configuration
// ============================================================================

/// PPO hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PPOConfig {
    /// Policy architecture.
    pub policy: PolicyConfig,
    pub learning_rate: Schedule,
    /// Steps per environment per rollout.
    pub n_steps: usize,
    /// Minibatch size.
    pub batch_size: usize,
    /// Passes over each rollout.
    pub n_epochs: usize,
    pub gamma: f32,
    pub gae_lambda: f32,
    /// Policy ratio clip range.
    pub clip_range: Schedule,
    /// Clip range for the value prediction, `None` disables value clipping.
    pub clip_range_vf: Option<Schedule>,
    /// Normalize advantages per minibatch.
    pub normalize_advantage: bool,
    pub ent_coef: f32,
    pub vf_coef: f32,
    /// Gradient norm clipping, `None` disables it.
    pub max_grad_norm: Option<f32>,
    /// KL threshold for early stopping of an epoch.
    pub target_kl: Option<f32>,
    pub seed: Option<u64>,
    /// 0: quiet, 1: console table per iteration.
    pub verbose: u8,
    /// Evaluate on a copy of the training environment during `learn`.
    pub create_eval_env: bool,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::mlp(),
            learning_rate: Schedule::Constant(3e-4),
            n_steps: 2048,
            batch_size: 64,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: Schedule::Constant(0.2),
            clip_range_vf: None,
            normalize_advantage: true,
            ent_coef: 0.0,
            vf_coef: 0.5,
            max_grad_norm: Some(0.5),
            target_kl: None,
            seed: None,
            verbose: 0,
            create_eval_env: false,
        }
    }
}

impl PPOConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: impl Into<Schedule>) -> Self {
        self.learning_rate = learning_rate.into();
        self
    }

    pub fn with_n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_gae_lambda(mut self, gae_lambda: f32) -> Self {
        self.gae_lambda = gae_lambda;
        self
    }

    pub fn with_clip_range(mut self, clip_range: impl Into<Schedule>) -> Self {
        self.clip_range = clip_range.into();
        self
    }

    pub fn with_clip_range_vf(mut self, clip_range_vf: Option<Schedule>) -> Self {
        self.clip_range_vf = clip_range_vf;
        self
    }

    pub fn with_normalize_advantage(mut self, normalize: bool) -> Self {
        self.normalize_advantage = normalize;
        self
    }

    pub fn with_ent_coef(mut self, ent_coef: f32) -> Self {
        self.ent_coef = ent_coef;
        self
    }

    pub fn with_vf_coef(mut self, vf_coef: f32) -> Self {
        self.vf_coef = vf_coef;
        self
    }

    pub fn with_max_grad_norm(mut self, max_grad_norm: Option<f32>) -> Self {
        self.max_grad_norm = max_grad_norm;
        self
    }

    pub fn with_target_kl(mut self, target_kl: Option<f32>) -> Self {
        self.target_kl = target_kl;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_create_eval_env(mut self, create_eval_env: bool) -> Self {
        self.create_eval_env = create_eval_env;
        self
    }

    /// Validate the configuration for `n_envs` environments.
    pub fn validate(&self, n_envs: usize) -> std::result::Result<(), ConfigError> {
        self.settings().validate()?;
        if self.n_epochs == 0 {
            return Err(ConfigError::InvalidCount {
                field: "n_epochs",
                value: 0,
            });
        }
        // Advantage normalization needs at least two samples
        if self.batch_size < 2 {
            return Err(ConfigError::InvalidCount {
                field: "batch_size",
                value: self.batch_size,
            });
        }
        let rollout_size = self.n_steps * n_envs;
        if self.batch_size > rollout_size {
            return Err(ConfigError::InvalidBatchSize {
                batch_size: self.batch_size,
                rollout_size,
            });
        }
        self.learning_rate.validate("learning_rate")?;
        self.clip_range.validate("clip_range")?;
        if let Some(clip_range_vf) = &self.clip_range_vf {
            clip_range_vf.validate("clip_range_vf")?;
        }
        check_positive("max_grad_norm", self.max_grad_norm)?;
        check_positive("target_kl", self.target_kl)?;
        Ok(())
    }

    pub(crate) fn settings(&self) -> OnPolicySettings {
        OnPolicySettings {
            policy: self.policy.clone(),
            n_steps: self.n_steps,
            gamma: self.gamma,
            gae_lambda: self.gae_lambda,
            seed: self.seed,
            verbose: self.verbose,
            create_eval_env: self.create_eval_env,
        }
    }
}

// ============================================================================
// PPO
// ============================================================================

/// PPO model.
pub struct PPO<B: AutodiffBackend> {
    config: PPOConfig,
    core: OnPolicyCore<B>,
    /// Created by the first `learn`; Adam moments carry over to later calls.
    optimizer: Option<Box<dyn PolicyOptimizer<B>>>,
}

impl<B: AutodiffBackend> PPO<B> {
    /// Build a model with a fresh policy for `env`.
    pub fn new(env: impl VecEnv + 'static, config: PPOConfig, device: &B::Device) -> Result<Self> {
        config.validate(env.num_envs())?;
        let core = OnPolicyCore::new(Box::new(env), config.settings(), device)?;
        Ok(Self {
            config,
            core,
            optimizer: None,
        })
    }

    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    /// Whether a previous `learn` left optimizer state behind.
    pub fn has_optimizer_state(&self) -> bool {
        self.optimizer.is_some()
    }

    /// Drop the optimizer state; the next `learn` starts a fresh Adam.
    pub fn reset_optimizer(&mut self) {
        self.optimizer = None;
    }
}

impl<B: AutodiffBackend> BaseRLModel<B> for PPO<B> {
    const ALGORITHM: &'static str = "PPO";

    fn core(&self) -> &OnPolicyCore<B> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OnPolicyCore<B> {
        &mut self.core
    }

    fn hyperparameters(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.config)?)
    }

    fn from_archive(
        data: &ArchiveData,
        env: Option<Box<dyn VecEnv>>,
        device: &B::Device,
    ) -> Result<Self> {
        let mut config: PPOConfig = serde_json::from_value(data.hyperparameters.clone())?;
        config.policy = data.policy_config.clone();
        if let Some(env) = &env {
            config.validate(env.num_envs())?;
        }
        let core = OnPolicyCore::from_archive(data, env, config.settings(), device)?;
        Ok(Self {
            config,
            core,
            optimizer: None,
        })
    }

    fn learn(&mut self, total_timesteps: usize, options: LearnOptions) -> Result<()> {
        let config = self.config.clone();
        // Taken out while the loop borrows the model, put back afterwards
        let mut optimizer: Box<dyn PolicyOptimizer<B>> = match self.optimizer.take() {
            Some(optimizer) => optimizer,
            None => Box::new(create_adam::<B>(config.max_grad_norm)),
        };
        let result = run_learning::<B, _, _>(self, total_timesteps, options, |core, progress| {
            train_ppo(core, optimizer.as_mut(), &config, progress)
        });
        self.optimizer = Some(optimizer);
        result
    }
}

/// Run the PPO update on the collected rollout.
pub(crate) fn train_ppo<B: AutodiffBackend>(
    core: &mut OnPolicyCore<B>,
    optimizer: &mut dyn PolicyOptimizer<B>,
    config: &PPOConfig,
    progress_remaining: f64,
) -> Result<TrainStats> {
    let learning_rate = config.learning_rate.value(progress_remaining);
    let clip_range = config.clip_range.value(progress_remaining) as f32;
    let clip_range_vf = config
        .clip_range_vf
        .map(|schedule| schedule.value(progress_remaining) as f32);

    let device = core.device().clone();
    let observation_space = core.observation_space().clone();
    let action_dim = core.action_space().shape_dim();
    let mut policy = core.policy().clone();

    let mut policy_losses = Vec::new();
    let mut value_losses = Vec::new();
    let mut entropy_losses = Vec::new();
    let mut clip_fractions = Vec::new();
    let mut approx_kls = Vec::new();
    let mut continue_training = true;

    for epoch in 0..config.n_epochs {
        for batch in core.rollout_minibatches(Some(config.batch_size)) {
            let batch_size = batch.len();
            let features = policy.features_tensor(&observation_space, &batch.observations, batch_size)?;
            let actions = Tensor::<B, 1>::from_floats(batch.actions.as_slice(), &device)
                .reshape([batch_size, action_dim]);
            let (values, log_prob, entropy) = policy.evaluate_actions(features, actions);

            let mut advantages = batch.advantages;
            if config.normalize_advantage && batch_size > 1 {
                normalize_advantages(&mut advantages);
            }
            let advantages = Tensor::<B, 1>::from_floats(advantages.as_slice(), &device);
            let old_log_prob = Tensor::<B, 1>::from_floats(batch.old_log_probs.as_slice(), &device);
            let old_values = Tensor::<B, 1>::from_floats(batch.old_values.as_slice(), &device);
            let returns = Tensor::<B, 1>::from_floats(batch.returns.as_slice(), &device);

            // Clipped surrogate objective
            let log_ratio = log_prob - old_log_prob;
            let ratio = log_ratio.clone().exp();
            let surr1 = ratio.clone() * advantages.clone();
            let surr2 = ratio.clone().clamp(1.0 - clip_range, 1.0 + clip_range) * advantages;
            let policy_loss = -surr1.min_pair(surr2).mean();

            let values_pred = match clip_range_vf {
                Some(clip) => old_values.clone() + (values - old_values).clamp(-clip, clip),
                None => values,
            };
            let value_loss = (returns - values_pred).powf_scalar(2.0).mean();
            let entropy_loss = -entropy.mean();

            let clip_fraction = (ratio.clone() - 1.0)
                .abs()
                .greater_elem(clip_range)
                .float()
                .mean();
            let approx_kl = scalar(((ratio - 1.0) - log_ratio).mean())?;

            policy_losses.push(scalar(policy_loss.clone())?);
            value_losses.push(scalar(value_loss.clone())?);
            entropy_losses.push(scalar(entropy_loss.clone())?);
            clip_fractions.push(scalar(clip_fraction)?);
            approx_kls.push(approx_kl);

            if let Some(target_kl) = config.target_kl {
                if approx_kl > 1.5 * target_kl {
                    log::debug!(
                        "Early stopping at epoch {} due to reaching max kl: {:.4}",
                        epoch,
                        approx_kl
                    );
                    continue_training = false;
                    break;
                }
            }

            let loss = policy_loss
                + entropy_loss.mul_scalar(config.ent_coef)
                + value_loss.mul_scalar(config.vf_coef);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &policy);
            policy = optimizer.step(learning_rate, policy, grads);
        }

        if !continue_training {
            break;
        }
    }

    core.set_policy(policy);
    let buffer = core.rollout_buffer();

    Ok(TrainStats {
        policy_loss: mean(&policy_losses),
        value_loss: mean(&value_losses),
        entropy_loss: mean(&entropy_losses),
        approx_kl: Some(mean(&approx_kls)),
        clip_fraction: Some(mean(&clip_fractions)),
        explained_variance: explained_variance(buffer.values(), buffer.returns()),
        learning_rate,
    })
}
