//! Identity environments: the optimal action is the current observation.
//!
//! After every step a fresh state is sampled from the action space and the
//! episode ends after `ep_length` steps. A perfect policy collects a reward of
//! 1.0 on every step.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{Env, EnvStep};
use crate::spaces::Space;

/// Default episode length.
pub const DEFAULT_EP_LENGTH: usize = 100;

/// Identity task over a discrete space.
///
/// Reward is 1.0 when the action index equals the observed index.
#[derive(Debug, Clone)]
pub struct IdentityEnv {
    space: Space,
    ep_length: usize,
    current_step: usize,
    state: Vec<f32>,
    rng: StdRng,
}

impl IdentityEnv {
    /// Create an identity task with `dim` choices and the default episode length.
    pub fn new(dim: usize) -> Self {
        Self::with_ep_length(dim, DEFAULT_EP_LENGTH)
    }

    /// Create an identity task with an explicit episode length.
    pub fn with_ep_length(dim: usize, ep_length: usize) -> Self {
        let space = Space::discrete(dim);
        let mut rng = StdRng::from_entropy();
        let state = space.sample(&mut rng);
        Self {
            space,
            ep_length,
            current_step: 0,
            state,
            rng,
        }
    }

    /// Steps taken in the current episode.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// The state the agent should echo.
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    fn choose_next_state(&mut self) {
        self.state = self.space.sample(&mut self.rng);
    }
}

impl Env for IdentityEnv {
    fn observation_space(&self) -> &Space {
        &self.space
    }

    fn action_space(&self) -> &Space {
        &self.space
    }

    fn reset(&mut self) -> Vec<f32> {
        self.current_step = 0;
        self.choose_next_state();
        self.state.clone()
    }

    fn step(&mut self, action: &[f32]) -> EnvStep {
        let reward = if action.len() == 1 && action[0].round() == self.state[0] {
            1.0
        } else {
            0.0
        };
        self.choose_next_state();
        self.current_step += 1;
        let done = self.current_step >= self.ep_length;
        EnvStep::new(self.state.clone(), reward, done)
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

/// Identity task over a one-dimensional box.
///
/// Reward is 1.0 when the action lies within `eps` of the observed value.
#[derive(Debug, Clone)]
pub struct IdentityEnvBox {
    space: Space,
    eps: f32,
    ep_length: usize,
    current_step: usize,
    state: Vec<f32>,
    rng: StdRng,
}

impl Default for IdentityEnvBox {
    fn default() -> Self {
        Self::new(-1.0, 1.0, 0.05, DEFAULT_EP_LENGTH)
    }
}

impl IdentityEnvBox {
    /// Create a box identity task on `[low, high]`.
    pub fn new(low: f32, high: f32, eps: f32, ep_length: usize) -> Self {
        let space = Space::boxed(low, high, 1);
        let mut rng = StdRng::from_entropy();
        let state = space.sample(&mut rng);
        Self {
            space,
            eps,
            ep_length,
            current_step: 0,
            state,
            rng,
        }
    }

    /// Default bounds and tolerance with a custom episode length.
    pub fn with_ep_length(ep_length: usize) -> Self {
        Self::new(-1.0, 1.0, 0.05, ep_length)
    }

    /// Reward tolerance.
    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// The state the agent should echo.
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    fn choose_next_state(&mut self) {
        self.state = self.space.sample(&mut self.rng);
    }
}

impl Env for IdentityEnvBox {
    fn observation_space(&self) -> &Space {
        &self.space
    }

    fn action_space(&self) -> &Space {
        &self.space
    }

    fn reset(&mut self) -> Vec<f32> {
        self.current_step = 0;
        self.choose_next_state();
        self.state.clone()
    }

    fn step(&mut self, action: &[f32]) -> EnvStep {
        let target = self.state[0];
        let reward = match action.first() {
            Some(&a) if a >= target - self.eps && a <= target + self.eps => 1.0,
            _ => 0.0,
        };
        self.choose_next_state();
        self.current_step += 1;
        let done = self.current_step >= self.ep_length;
        EnvStep::new(self.state.clone(), reward, done)
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rewards_matching_action() {
        let mut env = IdentityEnv::with_ep_length(4, 10);
        env.seed(3);
        let obs = env.reset();
        let step = env.step(&obs);
        assert_eq!(step.reward, 1.0);

        let wrong = [(step.observation[0] + 1.0) % 4.0];
        let step = env.step(&wrong);
        assert_eq!(step.reward, 0.0);
    }

    #[test]
    fn test_identity_episode_length() {
        let mut env = IdentityEnv::with_ep_length(2, 3);
        env.reset();
        assert!(!env.step(&[0.0]).done);
        assert!(!env.step(&[0.0]).done);
        assert!(env.step(&[0.0]).done);
        assert_eq!(env.current_step(), 3);

        env.reset();
        assert_eq!(env.current_step(), 0);
    }

    #[test]
    fn test_identity_box_tolerance() {
        let mut env = IdentityEnvBox::default();
        env.seed(11);
        let obs = env.reset();

        let step = env.step(&[obs[0] + 0.04]);
        assert_eq!(step.reward, 1.0);

        let next = step.observation[0];
        let step = env.step(&[next + 0.2]);
        assert_eq!(step.reward, 0.0);
    }

    #[test]
    fn test_identity_box_observations_in_space() {
        let mut env = IdentityEnvBox::new(-2.0, 2.0, 0.1, 50);
        let space = env.observation_space().clone();
        assert!(space.contains(&env.reset()));
        for _ in 0..20 {
            let step = env.step(&[0.0]);
            assert!(space.contains(&step.observation));
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let mut a = IdentityEnvBox::default();
        let mut b = IdentityEnvBox::default();
        a.seed(42);
        b.seed(42);
        assert_eq!(a.reset(), b.reset());
        assert_eq!(a.step(&[0.0]), b.step(&[0.0]));
    }
}
