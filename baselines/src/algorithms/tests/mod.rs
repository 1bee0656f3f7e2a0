//! Behavioural tests for the models.
//!
//! - `save_load_tests`: parameter overwrite, training and archive round trips
//! - `learning_loop_tests`: evaluation, checkpointing and environment handling
//!   during `learn`

pub mod learning_loop_tests;
pub mod save_load_tests;
