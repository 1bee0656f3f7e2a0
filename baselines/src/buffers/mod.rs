//! Experience storage for on-policy training.
//!
//! - `RolloutBuffer`: fixed-length rollout, consumed after each training iteration
//! - GAE and advantage helpers shared by PPO and A2C

pub mod rollout_buffer;

pub use rollout_buffer::{
    compute_gae, explained_variance, normalize_advantages, RolloutBatch, RolloutBuffer,
};
