//! Policy evaluation on a vectorized environment.

use burn::tensor::backend::Backend;
use rand::Rng;

use crate::envs::VecEnv;
use crate::error::{ConfigError, Result};
use crate::policies::parameters::tensor_values;
use crate::policies::ActorCriticPolicy;

/// Outcome of [`evaluate_policy`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub mean_reward: f32,
    pub std_reward: f32,
    pub episode_rewards: Vec<f32>,
    pub episode_lengths: Vec<usize>,
}

impl EvaluationResult {
    fn from_episodes(episode_rewards: Vec<f32>, episode_lengths: Vec<usize>) -> Self {
        let n = episode_rewards.len().max(1) as f32;
        let mean_reward = episode_rewards.iter().sum::<f32>() / n;
        let variance = episode_rewards
            .iter()
            .map(|r| (r - mean_reward).powi(2))
            .sum::<f32>()
            / n;
        Self {
            mean_reward,
            std_reward: variance.sqrt(),
            episode_rewards,
            episode_lengths,
        }
    }

    /// Mean episode length.
    pub fn mean_length(&self) -> f32 {
        let n = self.episode_lengths.len().max(1) as f32;
        self.episode_lengths.iter().sum::<usize>() as f32 / n
    }
}

/// Run `policy` until `n_eval_episodes` episodes have finished across all
/// sub-environments of `env`.
///
/// The environment is reset first. Actions are clipped into the action
/// space before stepping. `deterministic` uses the distribution mode.
pub fn evaluate_policy<B: Backend, R: Rng + ?Sized>(
    policy: &ActorCriticPolicy<B>,
    env: &mut dyn VecEnv,
    n_eval_episodes: usize,
    deterministic: bool,
    rng: &mut R,
) -> Result<EvaluationResult> {
    if n_eval_episodes == 0 {
        return Err(ConfigError::InvalidCount {
            field: "n_eval_episodes",
            value: 0,
        }
        .into());
    }

    let n_envs = env.num_envs();
    let observation_space = env.observation_space().clone();
    let action_space = env.action_space().clone();
    let action_dim = action_space.shape_dim();

    let mut current_rewards = vec![0.0f32; n_envs];
    let mut current_lengths = vec![0usize; n_envs];
    let mut episode_rewards = Vec::with_capacity(n_eval_episodes);
    let mut episode_lengths = Vec::with_capacity(n_eval_episodes);

    let mut observations = env.reset();
    while episode_rewards.len() < n_eval_episodes {
        let features = policy.features_tensor(&observation_space, &observations, n_envs)?;
        let (distribution, _) = policy.forward(features);
        let actions = if deterministic {
            distribution.mode()
        } else {
            distribution.sample(rng)?
        };

        let mut actions = tensor_values(actions)?;
        for action in actions.chunks_mut(action_dim) {
            action_space.clip_action(action);
        }

        let step = env.step(&actions)?;
        for i in 0..n_envs {
            current_rewards[i] += step.rewards[i];
            current_lengths[i] += 1;
            if step.dones[i] {
                if episode_rewards.len() < n_eval_episodes {
                    episode_rewards.push(current_rewards[i]);
                    episode_lengths.push(current_lengths[i]);
                }
                current_rewards[i] = 0.0;
                current_lengths[i] = 0;
            }
        }
        observations = step.observations;
    }

    Ok(EvaluationResult::from_episodes(episode_rewards, episode_lengths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{DummyVecEnv, IdentityEnv, IdentityEnvBox};
    use crate::policies::PolicyConfig;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_collects_requested_episodes() {
        let mut env = DummyVecEnv::from_fn(2, || IdentityEnvBox::with_ep_length(5)).unwrap();
        let space = env.observation_space().clone();
        let policy: ActorCriticPolicy<TestBackend> = PolicyConfig::mlp()
            .init(&space, &space, &Default::default())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let result = evaluate_policy(&policy, &mut env, 3, true, &mut rng).unwrap();
        assert_eq!(result.episode_rewards.len(), 3);
        assert_eq!(result.episode_lengths, vec![5, 5, 5]);
        assert_eq!(result.mean_length(), 5.0);
        assert!(result.mean_reward >= 0.0 && result.mean_reward <= 5.0);
        assert!(result.std_reward >= 0.0);
    }

    #[test]
    fn test_stochastic_discrete_evaluation() {
        let mut env = DummyVecEnv::from_fn(1, || IdentityEnv::with_ep_length(3, 4)).unwrap();
        let space = env.observation_space().clone();
        let policy: ActorCriticPolicy<TestBackend> = PolicyConfig::mlp()
            .init(&space, &space, &Default::default())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = evaluate_policy(&policy, &mut env, 2, false, &mut rng).unwrap();
        assert_eq!(result.episode_lengths, vec![4, 4]);
    }

    #[test]
    fn test_zero_episodes_is_rejected() {
        let mut env = DummyVecEnv::from_fn(1, IdentityEnvBox::default).unwrap();
        let space = env.observation_space().clone();
        let policy: ActorCriticPolicy<TestBackend> = PolicyConfig::mlp()
            .init(&space, &space, &Default::default())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(evaluate_policy(&policy, &mut env, 0, true, &mut rng).is_err());
    }

    #[test]
    fn test_result_statistics() {
        let result = EvaluationResult::from_episodes(vec![1.0, 3.0], vec![2, 4]);
        assert_eq!(result.mean_reward, 2.0);
        assert_eq!(result.std_reward, 1.0);
        assert_eq!(result.mean_length(), 3.0);
    }
}
