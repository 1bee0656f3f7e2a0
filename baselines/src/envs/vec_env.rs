//! Vectorized environments.

use std::sync::Arc;

use super::Env;
use crate::error::{BaselinesError, Result};
use crate::spaces::Space;

/// Result from stepping vectorized environments.
#[derive(Debug, Clone)]
pub struct VecStepResult {
    /// Observations after step [n_envs * obs_dim] (flattened).
    ///
    /// For finished environments this is already the first observation of the
    /// next episode.
    pub observations: Vec<f32>,
    /// Rewards received [n_envs]
    pub rewards: Vec<f32>,
    /// Episode-end flags [n_envs]
    pub dones: Vec<bool>,
    /// Last observation of each finished episode (`None` for running envs).
    pub terminal_observations: Vec<Option<Vec<f32>>>,
}

impl VecStepResult {
    /// Number of environments that finished an episode on this step.
    pub fn done_count(&self) -> usize {
        self.dones.iter().filter(|&&d| d).count()
    }
}

/// A batch of environments stepped in lockstep.
///
/// Finished environments are reset automatically inside [`VecEnv::step`].
pub trait VecEnv: Send {
    /// Number of parallel environments.
    fn num_envs(&self) -> usize;

    /// Observation space shared by all environments.
    fn observation_space(&self) -> &Space;

    /// Action space shared by all environments.
    fn action_space(&self) -> &Space;

    /// Reset every environment and return the stacked observations.
    fn reset(&mut self) -> Vec<f32>;

    /// Step all environments with flat actions [n_envs * action_dim].
    fn step(&mut self, actions: &[f32]) -> Result<VecStepResult>;

    /// Reseed the environments; environment `i` receives `seed + i`.
    fn seed(&mut self, seed: u64);

    /// Build an independent environment of the same kind, if supported.
    ///
    /// Used to create evaluation environments.
    fn spawn_copy(&self) -> Option<Box<dyn VecEnv>> {
        None
    }
}

/// Factory producing a boxed environment.
pub type EnvFactory = Arc<dyn Fn() -> Box<dyn Env> + Send + Sync>;

/// Wrap a closure building a concrete environment into an [`EnvFactory`].
pub fn env_fn<E, F>(f: F) -> EnvFactory
where
    E: Env + 'static,
    F: Fn() -> E + Send + Sync + 'static,
{
    Arc::new(move || Box::new(f()) as Box<dyn Env>)
}

/// Vectorized environment that steps its sub-environments one after another
/// on the calling thread.
pub struct DummyVecEnv {
    factories: Vec<EnvFactory>,
    envs: Vec<Box<dyn Env>>,
    observation_space: Space,
    action_space: Space,
}

impl DummyVecEnv {
    /// Build one environment per factory.
    ///
    /// All environments must share the same observation and action spaces.
    pub fn new(factories: Vec<EnvFactory>) -> Result<Self> {
        if factories.is_empty() {
            return Err(BaselinesError::Config(
                crate::error::ConfigError::InvalidCount {
                    field: "num_envs",
                    value: 0,
                },
            ));
        }

        let envs: Vec<Box<dyn Env>> = factories.iter().map(|f| f()).collect();
        let observation_space = envs[0].observation_space().clone();
        let action_space = envs[0].action_space().clone();

        for env in envs.iter().skip(1) {
            if env.observation_space() != &observation_space {
                return Err(BaselinesError::SpaceMismatch {
                    expected: observation_space.to_string(),
                    actual: env.observation_space().to_string(),
                });
            }
            if env.action_space() != &action_space {
                return Err(BaselinesError::SpaceMismatch {
                    expected: action_space.to_string(),
                    actual: env.action_space().to_string(),
                });
            }
        }

        Ok(Self {
            factories,
            envs,
            observation_space,
            action_space,
        })
    }

    /// Build `n_envs` environments from the same closure.
    pub fn from_fn<E, F>(n_envs: usize, f: F) -> Result<Self>
    where
        E: Env + 'static,
        F: Fn() -> E + Send + Sync + 'static,
    {
        let factory = env_fn(f);
        Self::new(vec![factory; n_envs])
    }

    /// Access a sub-environment.
    pub fn env(&self, index: usize) -> Option<&dyn Env> {
        self.envs.get(index).map(|e| e.as_ref())
    }
}

impl VecEnv for DummyVecEnv {
    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn reset(&mut self) -> Vec<f32> {
        let obs_dim = self.observation_space.shape_dim();
        let mut observations = Vec::with_capacity(self.envs.len() * obs_dim);
        for env in &mut self.envs {
            observations.extend(env.reset());
        }
        observations
    }

    fn step(&mut self, actions: &[f32]) -> Result<VecStepResult> {
        let n_envs = self.envs.len();
        let action_dim = self.action_space.shape_dim();
        if actions.len() != n_envs * action_dim {
            return Err(BaselinesError::InvalidAction(format!(
                "expected {} action values for {} envs, got {}",
                n_envs * action_dim,
                n_envs,
                actions.len()
            )));
        }

        let obs_dim = self.observation_space.shape_dim();
        let mut observations = Vec::with_capacity(n_envs * obs_dim);
        let mut rewards = Vec::with_capacity(n_envs);
        let mut dones = Vec::with_capacity(n_envs);
        let mut terminal_observations = Vec::with_capacity(n_envs);

        for (i, env) in self.envs.iter_mut().enumerate() {
            let action = &actions[i * action_dim..(i + 1) * action_dim];
            let step = env.step(action);
            rewards.push(step.reward);
            dones.push(step.done);
            if step.done {
                terminal_observations.push(Some(step.observation));
                observations.extend(env.reset());
            } else {
                terminal_observations.push(None);
                observations.extend(step.observation);
            }
        }

        Ok(VecStepResult {
            observations,
            rewards,
            dones,
            terminal_observations,
        })
    }

    fn seed(&mut self, seed: u64) {
        for (i, env) in self.envs.iter_mut().enumerate() {
            env.seed(seed.wrapping_add(i as u64));
        }
    }

    fn spawn_copy(&self) -> Option<Box<dyn VecEnv>> {
        DummyVecEnv::new(self.factories.clone())
            .ok()
            .map(|env| Box::new(env) as Box<dyn VecEnv>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{IdentityEnv, IdentityEnvBox};

    #[test]
    fn test_reset_stacks_observations() {
        let mut env = DummyVecEnv::from_fn(3, IdentityEnvBox::default).unwrap();
        let obs = env.reset();
        assert_eq!(env.num_envs(), 3);
        assert_eq!(obs.len(), 3);
    }

    #[test]
    fn test_auto_reset_records_terminal_observation() {
        let mut env = DummyVecEnv::from_fn(2, || IdentityEnv::with_ep_length(3, 2)).unwrap();
        env.reset();

        let first = env.step(&[0.0, 0.0]).unwrap();
        assert_eq!(first.done_count(), 0);
        assert!(first.terminal_observations.iter().all(|o| o.is_none()));

        let second = env.step(&[0.0, 0.0]).unwrap();
        assert_eq!(second.dones, vec![true, true]);
        assert!(second.terminal_observations.iter().all(|o| o.is_some()));
        assert_eq!(second.observations.len(), 2);

        // Episodes restarted: two more steps before the next done
        let third = env.step(&[0.0, 0.0]).unwrap();
        assert_eq!(third.done_count(), 0);
    }

    #[test]
    fn test_wrong_action_count_is_rejected() {
        let mut env = DummyVecEnv::from_fn(2, IdentityEnvBox::default).unwrap();
        env.reset();
        assert!(matches!(
            env.step(&[0.0]),
            Err(BaselinesError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_mismatched_spaces_are_rejected() {
        let result = DummyVecEnv::new(vec![
            env_fn(IdentityEnvBox::default),
            env_fn(|| IdentityEnv::new(3)),
        ]);
        assert!(matches!(result, Err(BaselinesError::SpaceMismatch { .. })));
    }

    #[test]
    fn test_empty_factories_are_rejected() {
        assert!(DummyVecEnv::new(Vec::new()).is_err());
    }

    #[test]
    fn test_spawn_copy_is_independent() {
        let env = DummyVecEnv::from_fn(2, IdentityEnvBox::default).unwrap();
        let mut copy = env.spawn_copy().expect("dummy vec env can be copied");
        assert_eq!(copy.num_envs(), 2);
        assert_eq!(copy.observation_space(), env.observation_space());
        assert_eq!(copy.reset().len(), 2);
    }
}
