//! Shared machinery for on-policy models.
//!
//! - [`BaseRLModel`]: the public model API (parameters, predict, learn,
//!   save/load) implemented by [`PPO`](super::PPO) and [`A2C`](super::A2C)
//! - [`OnPolicyCore`]: policy, environments, rollout buffer and counters
//! - [`run_learning`]: the collect → train → evaluate → checkpoint loop

use std::fmt;
use std::path::{Path, PathBuf};

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::archive::{ArchiveData, ModelArchive, FORMAT_VERSION};
use crate::buffers::{RolloutBatch, RolloutBuffer};
use crate::checkpoint::{CheckpointConfig, Checkpointer};
use crate::envs::VecEnv;
use crate::error::{BaselinesError, ConfigError, Result};
use crate::evaluation::{evaluate_policy, EvaluationResult};
use crate::metrics::{ConsoleLogger, EpisodeStats, MetricsLogger, MultiLogger, TrainingSnapshot};
use crate::policies::parameters::tensor_values;
use crate::policies::{ActorCriticPolicy, ParameterMap, PolicyConfig};
use crate::schedules::progress_remaining;
use crate::spaces::Space;

// ============================================================================
// Options and settings
// ============================================================================

/// Options for one call to [`BaseRLModel::learn`].
pub struct LearnOptions {
    /// Evaluate on the evaluation environment every `eval_freq` timesteps.
    pub eval_freq: Option<usize>,
    /// Episodes per evaluation.
    pub n_eval_episodes: usize,
    /// Log every `log_interval` training iterations.
    pub log_interval: usize,
    /// Periodic and best-model archives.
    pub checkpoint: Option<CheckpointConfig>,
    /// Restart the timestep counter at zero.
    pub reset_num_timesteps: bool,
    /// Extra sink for training snapshots, fed next to the console table.
    pub logger: Option<Box<dyn MetricsLogger>>,
}

impl fmt::Debug for LearnOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearnOptions")
            .field("eval_freq", &self.eval_freq)
            .field("n_eval_episodes", &self.n_eval_episodes)
            .field("log_interval", &self.log_interval)
            .field("checkpoint", &self.checkpoint)
            .field("reset_num_timesteps", &self.reset_num_timesteps)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl Default for LearnOptions {
    fn default() -> Self {
        Self {
            eval_freq: None,
            n_eval_episodes: 5,
            log_interval: 1,
            checkpoint: None,
            reset_num_timesteps: true,
            logger: None,
        }
    }
}

impl LearnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_eval_freq(mut self, eval_freq: usize) -> Self {
        self.eval_freq = Some(eval_freq);
        self
    }

    pub fn with_n_eval_episodes(mut self, n: usize) -> Self {
        self.n_eval_episodes = n;
        self
    }

    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointConfig) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn with_reset_num_timesteps(mut self, reset: bool) -> Self {
        self.reset_num_timesteps = reset;
        self
    }

    /// Send every training snapshot to `logger` as well, e.g. a [`CSVLogger`].
    ///
    /// [`CSVLogger`]: crate::metrics::CSVLogger
    pub fn with_logger(mut self, logger: Box<dyn MetricsLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Validate options.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.eval_freq == Some(0) {
            return Err(ConfigError::InvalidCount {
                field: "eval_freq",
                value: 0,
            });
        }
        if self.n_eval_episodes == 0 {
            return Err(ConfigError::InvalidCount {
                field: "n_eval_episodes",
                value: 0,
            });
        }
        if self.log_interval == 0 {
            return Err(ConfigError::InvalidCount {
                field: "log_interval",
                value: 0,
            });
        }
        if let Some(checkpoint) = &self.checkpoint {
            checkpoint.validate()?;
        }
        Ok(())
    }
}

/// Settings shared by every on-policy algorithm config.
#[derive(Debug, Clone, PartialEq)]
pub struct OnPolicySettings {
    pub policy: PolicyConfig,
    pub n_steps: usize,
    pub gamma: f32,
    pub gae_lambda: f32,
    pub seed: Option<u64>,
    pub verbose: u8,
    pub create_eval_env: bool,
}

impl OnPolicySettings {
    /// Validate the shared fields.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.policy.validate()?;
        if self.n_steps == 0 {
            return Err(ConfigError::InvalidCount {
                field: "n_steps",
                value: 0,
            });
        }
        check_unit_interval("gamma", self.gamma)?;
        check_unit_interval("gae_lambda", self.gae_lambda)?;
        Ok(())
    }
}

pub(crate) fn check_unit_interval(field: &'static str, value: f32) -> std::result::Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

pub(crate) fn check_positive(
    field: &'static str,
    value: Option<f32>,
) -> std::result::Result<(), ConfigError> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(ConfigError::OutOfRange {
            field,
            value: v as f64,
            min: 0.0,
            max: f64::MAX,
        }),
        _ => Ok(()),
    }
}

/// Optimizer over the actor-critic policy that a model can own.
///
/// Implemented for every burn optimizer of the policy, so the concrete
/// adaptor type never has to be named.
pub trait PolicyOptimizer<B: AutodiffBackend> {
    /// One update of `policy` from `grads` with learning rate `lr`.
    fn step(
        &mut self,
        lr: f64,
        policy: ActorCriticPolicy<B>,
        grads: GradientsParams,
    ) -> ActorCriticPolicy<B>;
}

impl<B, O> PolicyOptimizer<B> for O
where
    B: AutodiffBackend,
    O: Optimizer<ActorCriticPolicy<B>, B>,
{
    fn step(
        &mut self,
        lr: f64,
        policy: ActorCriticPolicy<B>,
        grads: GradientsParams,
    ) -> ActorCriticPolicy<B> {
        Optimizer::step(self, lr, policy, grads)
    }
}

/// Adam with `eps = 1e-5` and optional gradient norm clipping.
pub(crate) fn create_adam<B: AutodiffBackend>(
    max_grad_norm: Option<f32>,
) -> impl Optimizer<ActorCriticPolicy<B>, B> {
    let mut adam_config = AdamConfig::new().with_epsilon(1e-5);

    if let Some(max_norm) = max_grad_norm {
        adam_config = adam_config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
    }

    adam_config.init()
}

/// Scalar statistics of one training phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainStats {
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy_loss: f32,
    pub approx_kl: Option<f32>,
    pub clip_fraction: Option<f32>,
    pub explained_variance: f32,
    pub learning_rate: f64,
}

/// Read a one-element tensor.
pub(crate) fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> Result<f32> {
    tensor_values(tensor)?
        .first()
        .copied()
        .ok_or_else(|| BaselinesError::Tensor("expected a scalar tensor".to_string()))
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

// ============================================================================
// OnPolicyCore
// ============================================================================

/// State shared by on-policy algorithms.
pub struct OnPolicyCore<B: AutodiffBackend> {
    policy: ActorCriticPolicy<B>,
    policy_config: PolicyConfig,
    observation_space: Space,
    action_space: Space,
    env: Option<Box<dyn VecEnv>>,
    eval_env: Option<Box<dyn VecEnv>>,
    create_eval_env: bool,
    rollout_buffer: RolloutBuffer,
    n_steps: usize,
    gamma: f32,
    gae_lambda: f32,
    num_timesteps: usize,
    /// Observations the next rollout starts from.
    last_obs: Option<Vec<f32>>,
    episode_stats: EpisodeStats,
    rng: StdRng,
    seed: Option<u64>,
    verbose: u8,
    device: B::Device,
}

impl<B: AutodiffBackend> OnPolicyCore<B> {
    /// Build a core around `env`, with a freshly initialized policy.
    pub fn new(env: Box<dyn VecEnv>, settings: OnPolicySettings, device: &B::Device) -> Result<Self> {
        let observation_space = env.observation_space().clone();
        let action_space = env.action_space().clone();
        Self::build(observation_space, action_space, Some(env), settings, device)
    }

    /// Build a core without an environment, e.g. for inference after loading.
    pub fn detached(
        observation_space: Space,
        action_space: Space,
        settings: OnPolicySettings,
        device: &B::Device,
    ) -> Result<Self> {
        Self::build(observation_space, action_space, None, settings, device)
    }

    /// Build a core for an archive; `env` must match the archived spaces.
    pub fn from_archive(
        data: &ArchiveData,
        env: Option<Box<dyn VecEnv>>,
        settings: OnPolicySettings,
        device: &B::Device,
    ) -> Result<Self> {
        if let Some(env) = &env {
            check_spaces(&data.observation_space, &data.action_space, &**env)?;
        }
        Self::build(
            data.observation_space.clone(),
            data.action_space.clone(),
            env,
            settings,
            device,
        )
    }

    fn build(
        observation_space: Space,
        action_space: Space,
        mut env: Option<Box<dyn VecEnv>>,
        settings: OnPolicySettings,
        device: &B::Device,
    ) -> Result<Self> {
        settings.validate()?;

        let mut rng = match settings.seed {
            Some(seed) => {
                // Tensor::random draws from the backend generator
                B::seed(device, seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };
        let policy = settings
            .policy
            .init_with_rng(&observation_space, &action_space, device, &mut rng)?;
        if let (Some(seed), Some(env)) = (settings.seed, env.as_mut()) {
            env.seed(seed);
        }

        let n_envs = env.as_ref().map(|e| e.num_envs()).unwrap_or(1);
        let rollout_buffer = RolloutBuffer::new(
            settings.n_steps,
            n_envs,
            observation_space.shape_dim(),
            action_space.shape_dim(),
        );

        let mut core = Self {
            policy,
            policy_config: settings.policy,
            observation_space,
            action_space,
            env: None,
            eval_env: None,
            create_eval_env: settings.create_eval_env,
            rollout_buffer,
            n_steps: settings.n_steps,
            gamma: settings.gamma,
            gae_lambda: settings.gae_lambda,
            num_timesteps: 0,
            last_obs: None,
            episode_stats: EpisodeStats::new(n_envs),
            rng,
            seed: settings.seed,
            verbose: settings.verbose,
            device: device.clone(),
        };
        if let Some(env) = env {
            core.attach_env(env)?;
        }
        Ok(core)
    }

    /// Replace the training environment.
    ///
    /// The spaces must match the policy. The rollout buffer is resized when
    /// the number of environments changes, and the evaluation environment is
    /// rebuilt from the new one.
    pub fn set_env(&mut self, env: Box<dyn VecEnv>) -> Result<()> {
        check_spaces(&self.observation_space, &self.action_space, &*env)?;
        let mut env = env;
        if let Some(seed) = self.seed {
            env.seed(seed);
        }
        self.attach_env(env)
    }

    fn attach_env(&mut self, env: Box<dyn VecEnv>) -> Result<()> {
        let n_envs = env.num_envs();
        if n_envs != self.rollout_buffer.n_envs() {
            self.rollout_buffer = RolloutBuffer::new(
                self.n_steps,
                n_envs,
                self.observation_space.shape_dim(),
                self.action_space.shape_dim(),
            );
            self.episode_stats = EpisodeStats::new(n_envs);
        }

        self.eval_env = if self.create_eval_env {
            let mut eval_env = env.spawn_copy().ok_or(BaselinesError::EvalEnvUnavailable)?;
            if let Some(seed) = self.seed {
                eval_env.seed(seed.wrapping_add(n_envs as u64));
            }
            Some(eval_env)
        } else {
            None
        };

        self.env = Some(env);
        self.last_obs = None;
        self.episode_stats.reset_current(n_envs);
        Ok(())
    }

    pub fn env(&self) -> Option<&dyn VecEnv> {
        self.env.as_deref()
    }

    pub fn eval_env(&self) -> Option<&dyn VecEnv> {
        self.eval_env.as_deref()
    }

    pub fn policy(&self) -> &ActorCriticPolicy<B> {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ActorCriticPolicy<B>) {
        self.policy = policy;
    }

    pub fn policy_mut(&mut self) -> &mut ActorCriticPolicy<B> {
        &mut self.policy
    }

    pub fn policy_config(&self) -> &PolicyConfig {
        &self.policy_config
    }

    pub fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    pub fn action_space(&self) -> &Space {
        &self.action_space
    }

    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    pub fn set_num_timesteps(&mut self, num_timesteps: usize) {
        self.num_timesteps = num_timesteps;
    }

    pub fn episode_stats(&self) -> &EpisodeStats {
        &self.episode_stats
    }

    pub fn rollout_buffer(&self) -> &RolloutBuffer {
        &self.rollout_buffer
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Shuffled minibatches of the current rollout.
    pub fn rollout_minibatches(&mut self, batch_size: Option<usize>) -> Vec<RolloutBatch> {
        self.rollout_buffer.minibatches(batch_size, &mut self.rng)
    }

    /// The current rollout as one batch, in collection order.
    pub fn rollout_batch(&self) -> RolloutBatch {
        let indices: Vec<usize> = (0..self.rollout_buffer.len()).collect();
        self.rollout_buffer.gather(&indices)
    }

    /// Restart counters before a fresh `learn` call.
    fn reset_progress(&mut self) {
        self.num_timesteps = 0;
        self.last_obs = None;
        let n_envs = self.rollout_buffer.n_envs();
        self.episode_stats.reset(n_envs);
    }

    /// Fill the rollout buffer with `n_steps` steps of every environment and
    /// compute returns and advantages.
    ///
    /// Sampled actions are stored unclipped; the environment receives them
    /// clipped into the action space.
    pub fn collect_rollouts(&mut self) -> Result<()> {
        let env = self.env.as_mut().ok_or(BaselinesError::NoEnvironment)?;
        let n_envs = env.num_envs();
        let action_dim = self.action_space.shape_dim();
        let policy = self.policy.valid();

        let mut observations = match self.last_obs.take() {
            Some(obs) => obs,
            None => env.reset(),
        };

        self.rollout_buffer.reset();
        while !self.rollout_buffer.is_full() {
            let features = policy.features_tensor(&self.observation_space, &observations, n_envs)?;
            let (distribution, values) = policy.forward(features);
            let actions = distribution.sample(&mut self.rng)?;
            let log_probs = tensor_values(distribution.log_prob(actions.clone()))?;
            let values = tensor_values(values)?;
            let actions = tensor_values(actions)?;

            let mut clipped = actions.clone();
            for action in clipped.chunks_mut(action_dim) {
                self.action_space.clip_action(action);
            }

            let step = env.step(&clipped)?;
            self.num_timesteps += n_envs;
            self.episode_stats.update(&step.rewards, &step.dones);
            self.rollout_buffer.add(
                &observations,
                &actions,
                &step.rewards,
                &step.dones,
                &values,
                &log_probs,
            );
            observations = step.observations;
        }

        let features = policy.features_tensor(&self.observation_space, &observations, n_envs)?;
        let last_values = tensor_values(policy.predict_values(features))?;
        self.rollout_buffer
            .compute_returns_and_advantage(&last_values, self.gamma, self.gae_lambda);
        self.last_obs = Some(observations);
        Ok(())
    }

    /// Actions for a batch of flat observations, clipped into the action space.
    pub fn predict(&mut self, observations: &[f32], deterministic: bool) -> Result<Vec<f32>> {
        let obs_dim = self.observation_space.shape_dim();
        if obs_dim == 0 || observations.is_empty() || observations.len() % obs_dim != 0 {
            return Err(BaselinesError::ShapeMismatch {
                name: "observation".to_string(),
                expected: vec![obs_dim],
                actual: vec![observations.len()],
            });
        }
        let n_items = observations.len() / obs_dim;

        let policy = self.policy.valid();
        let features = policy.features_tensor(&self.observation_space, observations, n_items)?;
        let (distribution, _) = policy.forward(features);
        let actions = if deterministic {
            distribution.mode()
        } else {
            distribution.sample(&mut self.rng)?
        };

        let mut actions = tensor_values(actions)?;
        for action in actions.chunks_mut(self.action_space.shape_dim()) {
            self.action_space.clip_action(action);
        }
        Ok(actions)
    }

    /// Evaluate the deterministic policy on the evaluation environment.
    ///
    /// Returns `None` when the core has no evaluation environment.
    pub fn evaluate(&mut self, n_eval_episodes: usize) -> Result<Option<EvaluationResult>> {
        let Some(eval_env) = self.eval_env.as_mut() else {
            return Ok(None);
        };
        let policy = self.policy.valid();
        evaluate_policy(&policy, &mut **eval_env, n_eval_episodes, true, &mut self.rng).map(Some)
    }
}

fn check_spaces(observation_space: &Space, action_space: &Space, env: &dyn VecEnv) -> Result<()> {
    if env.observation_space() != observation_space {
        return Err(BaselinesError::SpaceMismatch {
            expected: observation_space.to_string(),
            actual: env.observation_space().to_string(),
        });
    }
    if env.action_space() != action_space {
        return Err(BaselinesError::SpaceMismatch {
            expected: action_space.to_string(),
            actual: env.action_space().to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// BaseRLModel
// ============================================================================

/// Public API of a trainable model.
pub trait BaseRLModel<B: AutodiffBackend>: Sized {
    /// Algorithm name stored in archives.
    const ALGORITHM: &'static str;

    fn core(&self) -> &OnPolicyCore<B>;

    fn core_mut(&mut self) -> &mut OnPolicyCore<B>;

    /// Algorithm configuration stored in archives.
    fn hyperparameters(&self) -> Result<serde_json::Value>;

    /// Rebuild an untrained model from archive metadata.
    fn from_archive(
        data: &ArchiveData,
        env: Option<Box<dyn VecEnv>>,
        device: &B::Device,
    ) -> Result<Self>;

    /// Train for `total_timesteps` environment steps.
    fn learn(&mut self, total_timesteps: usize, options: LearnOptions) -> Result<()>;

    fn policy(&self) -> &ActorCriticPolicy<B> {
        self.core().policy()
    }

    /// Owned copy of every policy parameter.
    fn get_policy_parameters(&self) -> Result<ParameterMap> {
        self.policy().named_parameters()
    }

    /// Overwrite every policy parameter.
    fn load_parameters(&mut self, params: &ParameterMap) -> Result<()> {
        self.load_parameters_with(params, true)
    }

    /// Overwrite policy parameters. With `exact_match = false` a subset may
    /// be given.
    fn load_parameters_with(&mut self, params: &ParameterMap, exact_match: bool) -> Result<()> {
        self.core_mut().policy_mut().load_parameters(params, exact_match)
    }

    fn predict(&mut self, observations: &[f32], deterministic: bool) -> Result<Vec<f32>> {
        self.core_mut().predict(observations, deterministic)
    }

    fn num_timesteps(&self) -> usize {
        self.core().num_timesteps()
    }

    fn get_env(&self) -> Option<&dyn VecEnv> {
        self.core().env()
    }

    fn set_env(&mut self, env: Box<dyn VecEnv>) -> Result<()> {
        self.core_mut().set_env(env)
    }

    /// Write the model archive. A path without extension gets `.zip`.
    fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let core = self.core();
        let data = ArchiveData {
            algorithm: Self::ALGORITHM.to_string(),
            format_version: FORMAT_VERSION,
            observation_space: core.observation_space().clone(),
            action_space: core.action_space().clone(),
            policy_config: core.policy_config().clone(),
            hyperparameters: self.hyperparameters()?,
            num_timesteps: core.num_timesteps(),
            parameter_names: core.policy().parameter_shapes().into_keys().collect(),
        };
        ModelArchive::from_policy(data, core.policy())?.write(path)
    }

    /// Load a model archive, optionally attaching `env`.
    ///
    /// `path` may omit the `.zip` extension.
    fn load(path: impl AsRef<Path>, env: Option<Box<dyn VecEnv>>, device: &B::Device) -> Result<Self> {
        let archive = ModelArchive::read(path)?;
        if archive.data.algorithm != Self::ALGORITHM {
            return Err(BaselinesError::AlgorithmMismatch {
                expected: Self::ALGORITHM,
                found: archive.data.algorithm.clone(),
            });
        }

        let mut model = Self::from_archive(&archive.data, env, device)?;
        let template = model.core().policy().clone();
        let policy = archive.load_policy(template, device)?;
        let core = model.core_mut();
        core.set_policy(policy);
        core.set_num_timesteps(archive.data.num_timesteps);
        log::info!(
            "Loaded {} model at {} timesteps",
            Self::ALGORITHM,
            archive.data.num_timesteps
        );
        Ok(model)
    }
}

// ============================================================================
// Learning loop
// ============================================================================

/// Run the on-policy learning loop.
///
/// Each iteration collects one rollout, calls `train` with the remaining
/// progress, then logs, evaluates and checkpoints as configured.
pub fn run_learning<B, M, F>(
    model: &mut M,
    total_timesteps: usize,
    mut options: LearnOptions,
    mut train: F,
) -> Result<()>
where
    B: AutodiffBackend,
    M: BaseRLModel<B>,
    F: FnMut(&mut OnPolicyCore<B>, f64) -> Result<TrainStats>,
{
    options.validate()?;
    if model.core().env().is_none() {
        return Err(BaselinesError::NoEnvironment);
    }

    if options.reset_num_timesteps {
        model.core_mut().reset_progress();
    }
    let start = model.num_timesteps();
    let target = start + total_timesteps;

    let mut checkpointer = options
        .checkpoint
        .clone()
        .map(|config| Checkpointer::new(config).map(|c| c.with_start(start)))
        .transpose()?;
    let mut loggers = MultiLogger::new();
    if model.core().verbose() >= 1 {
        loggers = loggers.add(ConsoleLogger::new());
    }
    if let Some(logger) = options.logger.take() {
        loggers = loggers.add_boxed(logger);
    }
    let mut next_eval = options.eval_freq.map(|freq| start + freq);
    let mut warned_no_eval_env = false;
    let mut iteration = 0;

    log::info!(
        "{} learning for {} timesteps from {}",
        M::ALGORITHM,
        total_timesteps,
        start
    );

    while model.num_timesteps() < target {
        let progress = progress_remaining(model.num_timesteps() - start, total_timesteps);
        model.core_mut().collect_rollouts()?;
        let stats = train(model.core_mut(), progress)?;
        iteration += 1;
        let timesteps = model.num_timesteps();

        let mut eval_mean_reward = None;
        if let (Some(freq), Some(next)) = (options.eval_freq, next_eval.as_mut()) {
            if timesteps >= *next {
                while *next <= timesteps {
                    *next += freq;
                }
                match model.core_mut().evaluate(options.n_eval_episodes)? {
                    Some(result) => {
                        log::info!(
                            "Eval num_timesteps={}, episode_reward={:.2} +/- {:.2}, episode_length={:.1}",
                            timesteps,
                            result.mean_reward,
                            result.std_reward,
                            result.mean_length()
                        );
                        eval_mean_reward = Some(result.mean_reward);
                        if let Some(ckpt) = checkpointer.as_mut() {
                            if ckpt.is_new_best(result.mean_reward) {
                                model.save(ckpt.best_model_path())?;
                                ckpt.mark_best(result.mean_reward);
                            }
                        }
                    }
                    None if !warned_no_eval_env => {
                        log::warn!("eval_freq is set but the model has no evaluation environment");
                        warned_no_eval_env = true;
                    }
                    None => {}
                }
            }
        }

        if let Some(ckpt) = checkpointer.as_mut() {
            if ckpt.should_save(timesteps) {
                let path = model.save(ckpt.checkpoint_path(timesteps))?;
                ckpt.record(path, timesteps, eval_mean_reward)?;
            }
        }

        if iteration % options.log_interval == 0 {
            let episode_stats = model.core().episode_stats();
            let mut snapshot = TrainingSnapshot::new(iteration, timesteps, episode_stats.episodes())
                .with_episode_stats(episode_stats.mean_reward(), episode_stats.mean_length())
                .with_losses(stats.policy_loss, stats.value_loss, stats.entropy_loss)
                .with_learning_rate(stats.learning_rate)
                .with_eval_mean_reward(eval_mean_reward);
            snapshot.approx_kl = stats.approx_kl;
            snapshot.clip_fraction = stats.clip_fraction;
            snapshot.explained_variance = stats.explained_variance;

            if loggers.is_empty() {
                log::debug!("{:?}", snapshot);
            } else {
                loggers.log(&snapshot);
            }
        }
    }

    loggers.flush();
    log::info!(
        "{} finished learning at {} timesteps",
        M::ALGORITHM,
        model.num_timesteps()
    );
    Ok(())
}
