//! Advantage Actor-Critic.
//!
//! Synchronous A2C: one gradient step per rollout on the whole batch,
//!
//! ```text
//! L = -E[log π(a|s) · A] + vf_coef·(R - V)² - ent_coef·H
//! ```
//!
//! optimized with RMSProp (`alpha = 0.99`) by default.

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::{GradientsParams, Optimizer, RmsPropConfig};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::base::{
    check_positive, create_adam, run_learning, scalar, BaseRLModel, LearnOptions, OnPolicyCore,
    OnPolicySettings, PolicyOptimizer, TrainStats,
};
use crate::archive::ArchiveData;
use crate::buffers::{explained_variance, normalize_advantages};
use crate::envs::VecEnv;
use crate::error::{ConfigError, Result};
use crate::policies::{ActorCriticPolicy, PolicyConfig};
use crate::schedules::Schedule;

/// A2C hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2CConfig {
    pub policy: PolicyConfig,
    pub learning_rate: Schedule,
    /// Steps per environment per update.
    pub n_steps: usize,
    pub gamma: f32,
    /// 1.0 gives plain discounted returns.
    pub gae_lambda: f32,
    pub ent_coef: f32,
    pub vf_coef: f32,
    pub max_grad_norm: Option<f32>,
    pub rms_prop_eps: f32,
    /// RMSProp when true, Adam otherwise.
    pub use_rms_prop: bool,
    pub normalize_advantage: bool,
    pub seed: Option<u64>,
    pub verbose: u8,
    pub create_eval_env: bool,
}

impl Default for A2CConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::mlp(),
            learning_rate: Schedule::Constant(7e-4),
            n_steps: 5,
            gamma: 0.99,
            gae_lambda: 1.0,
            ent_coef: 0.0,
            vf_coef: 0.5,
            max_grad_norm: Some(0.5),
            rms_prop_eps: 1e-5,
            use_rms_prop: true,
            normalize_advantage: false,
            seed: None,
            verbose: 0,
            create_eval_env: false,
        }
    }
}

impl A2CConfig {
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

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_gae_lambda(mut self, gae_lambda: f32) -> Self {
        self.gae_lambda = gae_lambda;
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

    pub fn with_use_rms_prop(mut self, use_rms_prop: bool) -> Self {
        self.use_rms_prop = use_rms_prop;
        self
    }

    pub fn with_normalize_advantage(mut self, normalize: bool) -> Self {
        self.normalize_advantage = normalize;
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

    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.settings().validate()?;
        self.learning_rate.validate("learning_rate")?;
        check_positive("max_grad_norm", self.max_grad_norm)?;
        check_positive("rms_prop_eps", Some(self.rms_prop_eps))?;
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

fn create_rms_prop<B: AutodiffBackend>(
    eps: f32,
    max_grad_norm: Option<f32>,
) -> impl Optimizer<ActorCriticPolicy<B>, B> {
    let mut rms_config = RmsPropConfig::new().with_alpha(0.99).with_epsilon(eps);

    if let Some(max_norm) = max_grad_norm {
        rms_config = rms_config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
    }

    rms_config.init()
}

/// A2C model.
pub struct A2C<B: AutodiffBackend> {
    config: A2CConfig,
    core: OnPolicyCore<B>,
    /// RMSProp or Adam state, kept across calls to `learn`.
    optimizer: Option<Box<dyn PolicyOptimizer<B>>>,
}

impl<B: AutodiffBackend> A2C<B> {
    /// Build a model with a fresh policy for `env`.
    pub fn new(env: impl VecEnv + 'static, config: A2CConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let core = OnPolicyCore::new(Box::new(env), config.settings(), device)?;
        Ok(Self {
            config,
            core,
            optimizer: None,
        })
    }

    pub fn config(&self) -> &A2CConfig {
        &self.config
    }

    /// Whether a previous `learn` left optimizer state behind.
    pub fn has_optimizer_state(&self) -> bool {
        self.optimizer.is_some()
    }

    /// Drop the optimizer state; the next `learn` starts from scratch.
    pub fn reset_optimizer(&mut self) {
        self.optimizer = None;
    }
}

impl<B: AutodiffBackend> BaseRLModel<B> for A2C<B> {
    const ALGORITHM: &'static str = "A2C";

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
        let mut config: A2CConfig = serde_json::from_value(data.hyperparameters.clone())?;
        config.policy = data.policy_config.clone();
        config.validate()?;
        let core = OnPolicyCore::from_archive(data, env, config.settings(), device)?;
        Ok(Self {
            config,
            core,
            optimizer: None,
        })
    }

    fn learn(&mut self, total_timesteps: usize, options: LearnOptions) -> Result<()> {
        let config = self.config.clone();
        let mut optimizer: Box<dyn PolicyOptimizer<B>> = match self.optimizer.take() {
            Some(optimizer) => optimizer,
            None if config.use_rms_prop => Box::new(create_rms_prop::<B>(
                config.rms_prop_eps,
                config.max_grad_norm,
            )),
            None => Box::new(create_adam::<B>(config.max_grad_norm)),
        };
        let result = run_learning::<B, _, _>(self, total_timesteps, options, |core, progress| {
            train_a2c(core, optimizer.as_mut(), &config, progress)
        });
        self.optimizer = Some(optimizer);
        result
    }
}

/// One gradient step on the whole rollout.
pub(crate) fn train_a2c<B: AutodiffBackend>(
    core: &mut OnPolicyCore<B>,
    optimizer: &mut dyn PolicyOptimizer<B>,
    config: &A2CConfig,
    progress_remaining: f64,
) -> Result<TrainStats> {
    let learning_rate = config.learning_rate.value(progress_remaining);
    let device = core.device().clone();
    let action_dim = core.action_space().shape_dim();
    let batch = core.rollout_batch();
    let batch_size = batch.len();
    let policy = core.policy().clone();

    let features = policy.features_tensor(core.observation_space(), &batch.observations, batch_size)?;
    let actions = Tensor::<B, 1>::from_floats(batch.actions.as_slice(), &device)
        .reshape([batch_size, action_dim]);
    let (values, log_prob, entropy) = policy.evaluate_actions(features, actions);

    let mut advantages = batch.advantages;
    if config.normalize_advantage && batch_size > 1 {
        normalize_advantages(&mut advantages);
    }
    let advantages = Tensor::<B, 1>::from_floats(advantages.as_slice(), &device);
    let returns = Tensor::<B, 1>::from_floats(batch.returns.as_slice(), &device);

    let policy_loss = -(advantages * log_prob).mean();
    let value_loss = (returns - values).powf_scalar(2.0).mean();
    let entropy_loss = -entropy.mean();

    let stats = TrainStats {
        policy_loss: scalar(policy_loss.clone())?,
        value_loss: scalar(value_loss.clone())?,
        entropy_loss: scalar(entropy_loss.clone())?,
        approx_kl: None,
        clip_fraction: None,
        explained_variance: explained_variance(
            core.rollout_buffer().values(),
            core.rollout_buffer().returns(),
        ),
        learning_rate,
    };

    let loss = policy_loss
        + entropy_loss.mul_scalar(config.ent_coef)
        + value_loss.mul_scalar(config.vf_coef);
    let grads = loss.backward();
    let grads = GradientsParams::from_grads(grads, &policy);
    core.set_policy(optimizer.step(learning_rate, policy, grads));

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{DummyVecEnv, IdentityEnv, IdentityEnvBox};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn small_config() -> A2CConfig {
        A2CConfig::new()
            .with_policy(PolicyConfig::mlp().with_net_arch(vec![8]))
            .with_seed(3)
    }

    #[test]
    fn test_default_config() {
        let config = A2CConfig::default();
        assert_eq!(config.n_steps, 5);
        assert_eq!(config.learning_rate, Schedule::Constant(7e-4));
        assert_eq!(config.gae_lambda, 1.0);
        assert!(config.use_rms_prop);
        assert!(!config.normalize_advantage);
        assert!(config.validate().is_ok());
        assert!(config.with_n_steps(0).validate().is_err());
    }

    #[test]
    fn test_learn_with_rms_prop() {
        let device = Default::default();
        let env = DummyVecEnv::from_fn(2, || IdentityEnvBox::with_ep_length(10)).unwrap();
        let mut model = A2C::<TestBackend>::new(env, small_config(), &device).unwrap();

        let before = model.get_policy_parameters().unwrap();
        model.learn(50, LearnOptions::new()).unwrap();
        assert_eq!(model.num_timesteps(), 50);
        assert_ne!(before, model.get_policy_parameters().unwrap());
    }

    #[test]
    fn test_learn_with_adam_discrete() {
        let device = Default::default();
        let env = DummyVecEnv::from_fn(1, || IdentityEnv::with_ep_length(3, 6)).unwrap();
        let config = small_config()
            .with_use_rms_prop(false)
            .with_normalize_advantage(true)
            .with_ent_coef(0.01);
        let mut model = A2C::<TestBackend>::new(env, config, &device).unwrap();

        let before = model.get_policy_parameters().unwrap();
        model.learn(20, LearnOptions::new()).unwrap();
        assert_eq!(model.num_timesteps(), 20);
        assert_ne!(before, model.get_policy_parameters().unwrap());
    }

    #[test]
    fn test_train_step_stats() {
        let device = Default::default();
        let env = DummyVecEnv::from_fn(1, || IdentityEnvBox::with_ep_length(10)).unwrap();
        let config = small_config();
        let mut model = A2C::<TestBackend>::new(env, config.clone(), &device).unwrap();
        let mut optimizer = create_rms_prop::<TestBackend>(config.rms_prop_eps, config.max_grad_norm);

        model.core_mut().collect_rollouts().unwrap();
        let stats = train_a2c::<TestBackend>(model.core_mut(), &mut optimizer, &config, 0.5).unwrap();
        assert!(stats.value_loss >= 0.0);
        assert!(stats.approx_kl.is_none());
        assert!(stats.clip_fraction.is_none());
        assert_eq!(stats.learning_rate, 7e-4);
    }
}
