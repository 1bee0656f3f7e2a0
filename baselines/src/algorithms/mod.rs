//! On-policy algorithms.
//!
//! - `base`: [`BaseRLModel`] trait, [`OnPolicyCore`] and the learning loop
//! - `ppo`: Proximal Policy Optimization (clipped surrogate, minibatch epochs)
//! - `a2c`: Advantage Actor-Critic (one full-batch step per rollout)

pub mod a2c;
pub mod base;
pub mod ppo;

pub use a2c::{A2CConfig, A2C};
pub use base::{
    run_learning, BaseRLModel, LearnOptions, OnPolicyCore, OnPolicySettings, PolicyOptimizer,
    TrainStats,
};
pub use ppo::{PPOConfig, PPO};

#[cfg(test)]
mod tests;
