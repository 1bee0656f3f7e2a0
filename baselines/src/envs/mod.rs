//! Environment abstraction.
//!
//! - [`Env`]: a single environment stepped one action at a time
//! - [`VecEnv`]: a batch of environments stepped together, with auto-reset
//! - [`DummyVecEnv`]: sequential `VecEnv` over boxed [`Env`] factories
//! - [`IdentityEnv`] / [`IdentityEnvBox`]: "repeat the observation" tasks used
//!   to smoke-test learning and persistence
//!
//! Observations and actions are flat `f32` slices laid out as described by
//! the environment's [`Space`]s.

pub mod identity;
pub mod vec_env;

pub use identity::{IdentityEnv, IdentityEnvBox};
pub use vec_env::{env_fn, DummyVecEnv, EnvFactory, VecEnv, VecStepResult};

use crate::spaces::Space;

/// Result of stepping a single environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    /// Observation after the step.
    pub observation: Vec<f32>,
    /// Reward received for the action.
    pub reward: f32,
    /// Whether the episode ended.
    pub done: bool,
}

impl EnvStep {
    /// Create a new step result.
    pub fn new(observation: Vec<f32>, reward: f32, done: bool) -> Self {
        Self {
            observation,
            reward,
            done,
        }
    }
}

/// A single reinforcement-learning environment.
pub trait Env: Send {
    /// Space of observations returned by `reset` and `step`.
    fn observation_space(&self) -> &Space;

    /// Space of actions accepted by `step`.
    fn action_space(&self) -> &Space;

    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Vec<f32>;

    /// Apply one action.
    ///
    /// The episode is not reset automatically when `done` is returned.
    fn step(&mut self, action: &[f32]) -> EnvStep;

    /// Reseed the environment's random generator.
    fn seed(&mut self, seed: u64);
}
