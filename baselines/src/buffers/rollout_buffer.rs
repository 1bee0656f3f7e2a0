//! Rollout buffer for on-policy algorithms (PPO/A2C).
//!
//! Key characteristics:
//! - Fixed capacity of `n_steps` per environment
//! - Transitions stored interleaved: [env0_t0, env1_t0, ..., env0_t1, env1_t1, ...]
//! - Advantages computed once the rollout is complete
//! - Cleared after each training iteration

use rand::seq::SliceRandom;
use rand::Rng;

/// Compute GAE advantages and returns for a single trajectory.
///
/// `dones[t]` marks that the episode ended with step `t`, so no value is
/// bootstrapped across it.
///
/// A_t = δ_t + γλ A_{t+1}, with δ_t = r_t + γ V(s_{t+1}) - V(s_t)
///
/// # Returns
///
/// (advantages, returns) - both [T]
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len().min(values.len()).min(dones.len());

    let mut advantages = vec![0.0f32; n];
    let mut returns = vec![0.0f32; n];

    let mut gae = 0.0f32;
    let mut next_value = last_value;

    for t in (0..n).rev() {
        let not_done = if dones[t] { 0.0 } else { 1.0 };
        let delta = rewards[t] + gamma * next_value * not_done - values[t];
        gae = delta + gamma * gae_lambda * not_done * gae;

        advantages[t] = gae;
        returns[t] = gae + values[t];
        next_value = values[t];
    }

    (advantages, returns)
}

/// Normalize to zero mean and unit variance.
///
/// Single-element slices are zero-centered.
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }
    if advantages.len() == 1 {
        advantages[0] = 0.0;
        return;
    }

    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    let variance = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n;
    let std = (variance + 1e-8).sqrt();

    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}

/// Fraction of the variance of `targets` explained by `predictions`.
///
/// 1.0 is a perfect fit, 0.0 is no better than predicting the mean, negative
/// is worse. Returns NaN when `targets` has no variance.
pub fn explained_variance(predictions: &[f32], targets: &[f32]) -> f32 {
    let n = predictions.len().min(targets.len());
    if n == 0 {
        return f32::NAN;
    }
    let var_y = variance(&targets[..n]);
    if var_y == 0.0 {
        return f32::NAN;
    }
    let residuals: Vec<f32> = targets[..n]
        .iter()
        .zip(predictions[..n].iter())
        .map(|(y, p)| y - p)
        .collect();
    let var_residual = variance(&residuals);
    1.0 - var_residual / var_y
}

fn variance(values: &[f32]) -> f32 {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    values.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n
}

/// One minibatch of flattened rollout data.
#[derive(Debug, Clone)]
pub struct RolloutBatch {
    /// [batch * obs_dim]
    pub observations: Vec<f32>,
    /// [batch * action_dim]
    pub actions: Vec<f32>,
    pub old_values: Vec<f32>,
    pub old_log_probs: Vec<f32>,
    pub advantages: Vec<f32>,
    pub returns: Vec<f32>,
}

impl RolloutBatch {
    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Check if batch is empty.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Storage for one on-policy rollout over `n_envs` environments.
#[derive(Debug, Clone)]
pub struct RolloutBuffer {
    n_steps: usize,
    n_envs: usize,
    obs_dim: usize,
    action_dim: usize,
    pos: usize,
    observations: Vec<f32>,
    actions: Vec<f32>,
    rewards: Vec<f32>,
    dones: Vec<bool>,
    values: Vec<f32>,
    log_probs: Vec<f32>,
    advantages: Vec<f32>,
    returns: Vec<f32>,
}

impl RolloutBuffer {
    /// Create a buffer holding `n_steps` steps of `n_envs` environments.
    ///
    /// `obs_dim` and `action_dim` are raw floats per observation/action.
    pub fn new(n_steps: usize, n_envs: usize, obs_dim: usize, action_dim: usize) -> Self {
        let capacity = n_steps * n_envs;
        Self {
            n_steps,
            n_envs,
            obs_dim,
            action_dim,
            pos: 0,
            observations: Vec::with_capacity(capacity * obs_dim),
            actions: Vec::with_capacity(capacity * action_dim),
            rewards: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            log_probs: Vec::with_capacity(capacity),
            advantages: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// Record one vectorized step. Every slice holds data for all envs.
    ///
    /// `dones[i]` is true when env `i` finished its episode with this step.
    pub fn add(
        &mut self,
        observations: &[f32],
        actions: &[f32],
        rewards: &[f32],
        dones: &[bool],
        values: &[f32],
        log_probs: &[f32],
    ) {
        debug_assert_eq!(observations.len(), self.n_envs * self.obs_dim);
        debug_assert_eq!(actions.len(), self.n_envs * self.action_dim);
        if self.is_full() {
            log::warn!("RolloutBuffer::add called on a full buffer, step dropped");
            return;
        }

        self.observations.extend_from_slice(observations);
        self.actions.extend_from_slice(actions);
        self.rewards.extend_from_slice(rewards);
        self.dones.extend_from_slice(dones);
        self.values.extend_from_slice(values);
        self.log_probs.extend_from_slice(log_probs);
        self.pos += 1;
    }

    /// Whether `n_steps` steps have been recorded.
    pub fn is_full(&self) -> bool {
        self.pos >= self.n_steps
    }

    /// Steps recorded so far (per environment).
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Total transitions stored.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn n_envs(&self) -> usize {
        self.n_envs
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Clear all transitions.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.observations.clear();
        self.actions.clear();
        self.rewards.clear();
        self.dones.clear();
        self.values.clear();
        self.log_probs.clear();
        self.advantages.clear();
        self.returns.clear();
    }

    /// Run GAE per environment, bootstrapping from `last_values` [n_envs].
    pub fn compute_returns_and_advantage(&mut self, last_values: &[f32], gamma: f32, gae_lambda: f32) {
        let total_len = self.len();
        let n_envs = self.n_envs;
        let rollout_len = total_len / n_envs.max(1);
        self.advantages = vec![0.0; total_len];
        self.returns = vec![0.0; total_len];

        for env_idx in 0..n_envs {
            let column = |data: &[f32]| -> Vec<f32> {
                (0..rollout_len).map(|t| data[t * n_envs + env_idx]).collect()
            };
            let env_rewards = column(&self.rewards);
            let env_values = column(&self.values);
            let env_dones: Vec<bool> = (0..rollout_len)
                .map(|t| self.dones[t * n_envs + env_idx])
                .collect();

            let (env_advantages, env_returns) = compute_gae(
                &env_rewards,
                &env_values,
                &env_dones,
                last_values.get(env_idx).copied().unwrap_or(0.0),
                gamma,
                gae_lambda,
            );

            for t in 0..rollout_len {
                self.advantages[t * n_envs + env_idx] = env_advantages[t];
                self.returns[t * n_envs + env_idx] = env_returns[t];
            }
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    pub fn advantages(&self) -> &[f32] {
        &self.advantages
    }

    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Gather a batch from transition indices.
    pub fn gather(&self, indices: &[usize]) -> RolloutBatch {
        let mut batch = RolloutBatch {
            observations: Vec::with_capacity(indices.len() * self.obs_dim),
            actions: Vec::with_capacity(indices.len() * self.action_dim),
            old_values: Vec::with_capacity(indices.len()),
            old_log_probs: Vec::with_capacity(indices.len()),
            advantages: Vec::with_capacity(indices.len()),
            returns: Vec::with_capacity(indices.len()),
        };
        for &i in indices {
            batch
                .observations
                .extend_from_slice(&self.observations[i * self.obs_dim..(i + 1) * self.obs_dim]);
            batch
                .actions
                .extend_from_slice(&self.actions[i * self.action_dim..(i + 1) * self.action_dim]);
            batch.old_values.push(self.values[i]);
            batch.old_log_probs.push(self.log_probs[i]);
            batch.advantages.push(self.advantages.get(i).copied().unwrap_or(0.0));
            batch.returns.push(self.returns.get(i).copied().unwrap_or(0.0));
        }
        batch
    }

    /// Shuffled minibatches covering the whole buffer.
    ///
    /// `None` yields a single batch with every transition. The last batch may
    /// be smaller than `batch_size`.
    pub fn minibatches<R: Rng + ?Sized>(&self, batch_size: Option<usize>, rng: &mut R) -> Vec<RolloutBatch> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);

        let size = batch_size.unwrap_or(indices.len()).max(1);
        indices.chunks(size).map(|chunk| self.gather(chunk)).collect()
    }
}
