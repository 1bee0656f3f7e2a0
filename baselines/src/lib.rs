//! # burn_baselines: on-policy reinforcement learning on Burn
//!
//! PPO and A2C models with a small, stable surface:
//!
//! ```text
//! ┌──────────────┐  reset / step   ┌───────────────────────────────┐
//! │   VecEnv     │◄───────────────►│ OnPolicyCore                  │
//! │ (DummyVecEnv)│                 │  ActorCriticPolicy (burn)     │
//! └──────────────┘                 │  RolloutBuffer + GAE          │
//!                                  └──────────────┬────────────────┘
//!                                                 │ train (PPO / A2C)
//!                     ┌───────────────────────────┼─────────────────┐
//!                     ▼                           ▼                 ▼
//!           get_policy_parameters      save / load (.zip)    evaluate / checkpoint
//!           load_parameters
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use burn::backend::{Autodiff, NdArray};
//! use burn_baselines::prelude::*;
//!
//! type B = Autodiff<NdArray<f32>>;
//!
//! let env = DummyVecEnv::from_fn(1, IdentityEnvBox::default)?;
//! let config = PPOConfig::new()
//!     .with_policy(PolicyConfig::mlp().with_net_arch(vec![16]))
//!     .with_verbose(1)
//!     .with_create_eval_env(true);
//! let mut model = PPO::<B>::new(env, config, &Default::default())?;
//!
//! model.learn(1000, LearnOptions::new().with_eval_freq(500))?;
//! model.save("test_save.zip")?;
//!
//! let loaded = PPO::<B>::load("test_save", None, &Default::default())?;
//! assert_eq!(loaded.get_policy_parameters()?, model.get_policy_parameters()?);
//! ```

pub mod algorithms;
pub mod archive;
pub mod buffers;
pub mod checkpoint;
pub mod envs;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod nn;
pub mod policies;
pub mod schedules;
pub mod spaces;

// Models
pub use algorithms::{
    A2CConfig, BaseRLModel, LearnOptions, OnPolicyCore, PPOConfig, TrainStats, A2C, PPO,
};

// Policies and parameters
pub use policies::{
    rand_like_map, Activation, ActionDistribution, ActorCriticPolicy, ParameterMap,
    ParameterTensor, PolicyConfig,
};

// Environments
pub use envs::{env_fn, DummyVecEnv, Env, EnvStep, IdentityEnv, IdentityEnvBox, VecEnv, VecStepResult};
pub use spaces::Space;

// Persistence
pub use archive::{ArchiveData, ModelArchive, ARCHIVE_EXTENSION};
pub use checkpoint::{CheckpointConfig, CheckpointInfo, Checkpointer};

pub use buffers::{RolloutBatch, RolloutBuffer};
pub use error::{BaselinesError, ConfigError, Result};
pub use evaluation::{evaluate_policy, EvaluationResult};
pub use metrics::{CSVLogger, ConsoleLogger, EpisodeStats, MetricsLogger, MultiLogger, TrainingSnapshot};
pub use schedules::Schedule;

/// Everything needed to build, train and persist a model.
pub mod prelude {
    pub use crate::algorithms::{A2CConfig, BaseRLModel, LearnOptions, PPOConfig, A2C, PPO};
    pub use crate::envs::{DummyVecEnv, Env, IdentityEnv, IdentityEnvBox, VecEnv};
    pub use crate::error::{BaselinesError, Result};
    pub use crate::policies::{rand_like_map, ParameterMap, PolicyConfig};
    pub use crate::schedules::Schedule;
    pub use crate::spaces::Space;
}
