//! Tests for the learning loop: evaluation, checkpoints and environment
//! handling.

use std::fs;

use burn::backend::{Autodiff, NdArray};
use tempfile::tempdir;

use crate::algorithms::{A2CConfig, BaseRLModel, LearnOptions, PPOConfig, A2C, PPO};
use crate::checkpoint::{CheckpointConfig, BEST_MODEL_FILE};
use crate::envs::{DummyVecEnv, IdentityEnvBox};
use crate::error::BaselinesError;
use crate::metrics::CSVLogger;
use crate::policies::PolicyConfig;

type B = Autodiff<NdArray<f32>>;

fn env() -> DummyVecEnv {
    DummyVecEnv::from_fn(1, || IdentityEnvBox::with_ep_length(8)).unwrap()
}

fn config() -> PPOConfig {
    PPOConfig::new()
        .with_policy(PolicyConfig::mlp().with_net_arch(vec![8]))
        .with_n_steps(16)
        .with_batch_size(8)
        .with_n_epochs(1)
        .with_seed(11)
}

#[test]
fn test_checkpoints_and_best_model_are_written() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let mut model =
        PPO::<B>::new(env(), config().with_create_eval_env(true), &device).unwrap();

    let checkpoint = CheckpointConfig::new(dir.path())
        .with_save_freq(32)
        .with_keep_last_n(2)
        .with_name_prefix("ppo");
    model
        .learn(
            96,
            LearnOptions::new()
                .with_eval_freq(32)
                .with_n_eval_episodes(2)
                .with_checkpoint(checkpoint),
        )
        .unwrap();

    assert!(dir.path().join(BEST_MODEL_FILE).is_file());
    assert!(!dir.path().join("ppo_00000032_steps.zip").exists());
    assert!(dir.path().join("ppo_00000064_steps.zip").is_file());
    assert!(dir.path().join("ppo_00000096_steps.zip").is_file());

    let restored = PPO::<B>::load(dir.path().join("ppo_00000096_steps"), None, &device).unwrap();
    assert_eq!(restored.num_timesteps(), 96);
    assert_eq!(
        restored.get_policy_parameters().unwrap(),
        model.get_policy_parameters().unwrap()
    );

    let best = PPO::<B>::load(dir.path().join("best_model"), None, &device).unwrap();
    assert!(best.num_timesteps() <= 96);
}

#[test]
fn test_eval_freq_without_eval_env_still_learns() {
    let device = Default::default();
    let mut model = PPO::<B>::new(env(), config(), &device).unwrap();
    assert!(model.core().eval_env().is_none());

    model
        .learn(48, LearnOptions::new().with_eval_freq(16))
        .unwrap();
    assert_eq!(model.num_timesteps(), 48);
}

#[test]
fn test_learn_requires_env_after_detached_load() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let model = PPO::<B>::new(env(), config(), &device).unwrap();
    let path = model.save(dir.path().join("detached")).unwrap();

    let mut loaded = PPO::<B>::load(&path, None, &device).unwrap();
    assert!(matches!(
        loaded.learn(16, LearnOptions::new()),
        Err(BaselinesError::NoEnvironment)
    ));

    loaded.set_env(Box::new(env())).unwrap();
    loaded.learn(16, LearnOptions::new()).unwrap();
    assert_eq!(loaded.num_timesteps(), 16);
}

#[test]
fn test_invalid_learn_options_are_rejected() {
    let device = Default::default();
    let mut model = PPO::<B>::new(env(), config(), &device).unwrap();

    let result = model.learn(16, LearnOptions::new().with_n_eval_episodes(0));
    assert!(matches!(result, Err(BaselinesError::Config(_))));
    assert_eq!(model.num_timesteps(), 0);
}

#[test]
fn test_zero_timesteps_is_a_no_op() {
    let device = Default::default();
    let mut model = PPO::<B>::new(env(), config(), &device).unwrap();
    let before = model.get_policy_parameters().unwrap();

    model.learn(0, LearnOptions::new()).unwrap();
    assert_eq!(model.num_timesteps(), 0);
    assert_eq!(model.get_policy_parameters().unwrap(), before);
}

#[test]
fn test_same_seed_gives_same_model() {
    let device = Default::default();
    let mut first = PPO::<B>::new(env(), config().with_seed(3), &device).unwrap();
    let mut second = PPO::<B>::new(env(), config().with_seed(3), &device).unwrap();
    let other = PPO::<B>::new(env(), config().with_seed(4), &device).unwrap();

    assert_eq!(
        first.get_policy_parameters().unwrap(),
        second.get_policy_parameters().unwrap()
    );
    assert_ne!(
        first.get_policy_parameters().unwrap(),
        other.get_policy_parameters().unwrap()
    );

    first.learn(32, LearnOptions::new()).unwrap();
    second.learn(32, LearnOptions::new()).unwrap();
    assert_eq!(
        first.get_policy_parameters().unwrap(),
        second.get_policy_parameters().unwrap()
    );

    let observations = [0.25, -0.5];
    assert_eq!(
        first.predict(&observations, false).unwrap(),
        second.predict(&observations, false).unwrap()
    );
}

#[test]
fn test_extra_logger_receives_every_iteration() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let path = dir.path().join("progress.csv");
    let mut model = PPO::<B>::new(env(), config(), &device).unwrap();

    let logger = CSVLogger::new(&path).unwrap();
    model
        .learn(48, LearnOptions::new().with_logger(Box::new(logger)))
        .unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("iteration,timesteps"));
    assert!(lines[1].starts_with("1,16,"));
    assert!(lines[3].starts_with("3,48,"));
}

#[test]
fn test_optimizer_state_carries_over_between_learn_calls() {
    let device = Default::default();
    let mut kept = PPO::<B>::new(env(), config(), &device).unwrap();
    let mut fresh = PPO::<B>::new(env(), config(), &device).unwrap();
    assert!(!kept.has_optimizer_state());

    kept.learn(16, LearnOptions::new()).unwrap();
    fresh.learn(16, LearnOptions::new()).unwrap();
    assert!(kept.has_optimizer_state());
    assert_eq!(
        kept.get_policy_parameters().unwrap(),
        fresh.get_policy_parameters().unwrap()
    );

    fresh.reset_optimizer();
    assert!(!fresh.has_optimizer_state());

    let resume = || LearnOptions::new().with_reset_num_timesteps(false);
    kept.learn(16, resume()).unwrap();
    fresh.learn(16, resume()).unwrap();
    assert_eq!(kept.num_timesteps(), 32);
    assert_ne!(
        kept.get_policy_parameters().unwrap(),
        fresh.get_policy_parameters().unwrap()
    );
}

#[test]
fn test_a2c_keeps_rms_prop_state() {
    let device = Default::default();
    let config = A2CConfig::new()
        .with_policy(PolicyConfig::mlp().with_net_arch(vec![8]))
        .with_n_steps(8)
        .with_seed(5);
    let mut model = A2C::<B>::new(env(), config, &device).unwrap();

    model.learn(16, LearnOptions::new()).unwrap();
    assert!(model.has_optimizer_state());
    model.reset_optimizer();
    assert!(!model.has_optimizer_state());
    model.learn(8, LearnOptions::new()).unwrap();
    assert!(model.has_optimizer_state());
}
