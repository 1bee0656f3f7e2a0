//! Model checkpointing during training.
//!
//! ## Features
//!
//! - Periodic archives every `save_freq` environment steps
//! - `best_model.zip` whenever the evaluation reward improves
//! - Automatic cleanup of old checkpoints
//!
//! ## Example
//!
//! ```rust,ignore
//! use burn_baselines::checkpoint::CheckpointConfig;
//! use burn_baselines::algorithms::LearnOptions;
//!
//! let options = LearnOptions::new()
//!     .with_eval_freq(5_000)
//!     .with_checkpoint(CheckpointConfig::new("./checkpoints").with_save_freq(10_000));
//!
//! model.learn(100_000, options)?;
//! ```

pub mod checkpointer;

pub use checkpointer::{CheckpointConfig, CheckpointInfo, Checkpointer, BEST_MODEL_FILE};
