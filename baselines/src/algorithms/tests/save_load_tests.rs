//! Parameter access and archive round trips.
//!
//! The central scenario: overwrite the policy with random tensors, train
//! briefly, save, reload from the path without its extension, and require
//! every parameter to come back bit for bit.

use std::fs;

use burn::backend::{Autodiff, NdArray};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use crate::algorithms::{A2CConfig, BaseRLModel, LearnOptions, PPOConfig, A2C, PPO};
use crate::envs::{DummyVecEnv, IdentityEnv, IdentityEnvBox, VecEnv};
use crate::error::BaselinesError;
use crate::policies::{rand_like_map, ParameterMap, PolicyConfig};

type B = Autodiff<NdArray<f32>>;

fn identity_box_env() -> DummyVecEnv {
    DummyVecEnv::from_fn(1, || IdentityEnvBox::with_ep_length(50)).unwrap()
}

fn small_ppo_config() -> PPOConfig {
    PPOConfig::new()
        .with_policy(PolicyConfig::mlp().with_net_arch(vec![16]))
        .with_n_steps(32)
        .with_batch_size(16)
        .with_n_epochs(2)
        .with_seed(0)
}

fn assert_params_equal(expected: &ParameterMap, actual: &ParameterMap) {
    let expected_names: Vec<&String> = expected.keys().collect();
    let actual_names: Vec<&String> = actual.keys().collect();
    assert_eq!(expected_names, actual_names, "Parameter names differ");
    for (name, tensor) in expected {
        assert_eq!(
            tensor.max_abs_diff(&actual[name]),
            Some(0.0),
            "Parameter {} changed across save/load",
            name
        );
    }
}

// ============================================================================
// Scenario: random overwrite → learn → save → load
// ============================================================================

#[test]
fn test_ppo_random_overwrite_learn_save_load() {
    let device = Default::default();
    let dir = tempdir().unwrap();

    let config = PPOConfig::new()
        .with_policy(PolicyConfig::mlp().with_net_arch(vec![16]))
        .with_verbose(1)
        .with_create_eval_env(true)
        .with_n_steps(64)
        .with_batch_size(32)
        .with_n_epochs(2)
        .with_seed(0);
    let mut model = PPO::<B>::new(identity_box_env(), config, &device).unwrap();

    let original_params = model.get_policy_parameters().unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let random_params = rand_like_map(&original_params, &mut rng);
    model.load_parameters(&random_params).unwrap();

    let new_params = model.get_policy_parameters().unwrap();
    assert!(
        original_params
            .iter()
            .any(|(name, tensor)| new_params[name] != *tensor),
        "Loading random parameters did not change the policy"
    );
    assert_params_equal(&random_params, &new_params);

    model
        .learn(1000, LearnOptions::new().with_eval_freq(500))
        .unwrap();
    assert!(model.num_timesteps() >= 1000);
    let params = model.get_policy_parameters().unwrap();

    let saved_path = model.save(dir.path().join("test_save.zip")).unwrap();
    assert_eq!(saved_path, dir.path().join("test_save.zip"));
    assert!(saved_path.is_file());

    let loaded = PPO::<B>::load(dir.path().join("test_save"), None, &device).unwrap();
    assert_params_equal(&params, &loaded.get_policy_parameters().unwrap());
    assert_eq!(loaded.num_timesteps(), model.num_timesteps());
    assert_eq!(loaded.config(), model.config());
    assert!(loaded.get_env().is_none());

    fs::remove_file(&saved_path).unwrap();
    assert!(!saved_path.exists());
}

#[test]
fn test_snapshot_is_an_owned_copy() {
    let device = Default::default();
    let mut model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();

    let snapshot = model.get_policy_parameters().unwrap();
    model.learn(32, LearnOptions::new()).unwrap();

    // Training moved the live weights, the snapshot kept the old ones
    assert_ne!(snapshot, model.get_policy_parameters().unwrap());
}

#[test]
fn test_loaded_model_predicts_identically() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let mut model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();
    model.learn(32, LearnOptions::new()).unwrap();

    let observations = [-0.9, -0.2, 0.0, 0.4, 0.8];
    let expected = model.predict(&observations, true).unwrap();

    let path = model.save(dir.path().join("model")).unwrap();
    assert_eq!(path, dir.path().join("model.zip"));

    let mut loaded = PPO::<B>::load(&path, None, &device).unwrap();
    assert_eq!(loaded.predict(&observations, true).unwrap(), expected);
}

#[test]
fn test_a2c_discrete_round_trip_with_env() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let make_env = || DummyVecEnv::from_fn(2, || IdentityEnv::with_ep_length(4, 10)).unwrap();

    let config = A2CConfig::new()
        .with_policy(PolicyConfig::mlp().with_net_arch(vec![8, 8]))
        .with_seed(5);
    let mut model = A2C::<B>::new(make_env(), config, &device).unwrap();
    model.learn(40, LearnOptions::new()).unwrap();
    let params = model.get_policy_parameters().unwrap();
    assert!(!params.contains_key("log_std"));

    let path = model.save(dir.path().join("a2c_model")).unwrap();
    let mut loaded = A2C::<B>::load(&path, Some(Box::new(make_env())), &device).unwrap();
    assert_params_equal(&params, &loaded.get_policy_parameters().unwrap());
    assert_eq!(loaded.get_env().map(|env| env.num_envs()), Some(2));

    // Continue training from the restored counter
    loaded
        .learn(20, LearnOptions::new().with_reset_num_timesteps(false))
        .unwrap();
    assert_eq!(loaded.num_timesteps(), 60);
}

// ============================================================================
// Load errors
// ============================================================================

#[test]
fn test_load_rejects_other_algorithm() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();
    let path = model.save(dir.path().join("ppo_model")).unwrap();

    match A2C::<B>::load(&path, None, &device) {
        Err(BaselinesError::AlgorithmMismatch { expected, found }) => {
            assert_eq!(expected, "A2C");
            assert_eq!(found, "PPO");
        }
        Err(other) => panic!("expected AlgorithmMismatch, got {}", other),
        Ok(_) => panic!("loading a PPO archive as A2C should fail"),
    }
}

#[test]
fn test_load_missing_file() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let result = PPO::<B>::load(dir.path().join("does_not_exist"), None, &device);
    assert!(matches!(result, Err(BaselinesError::Io(_))));
}

#[test]
fn test_load_rejects_env_with_other_spaces() {
    let device = Default::default();
    let dir = tempdir().unwrap();
    let model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();
    let path = model.save(dir.path().join("box_model")).unwrap();

    let discrete: Box<dyn VecEnv> =
        Box::new(DummyVecEnv::from_fn(1, || IdentityEnv::new(3)).unwrap());
    let result = PPO::<B>::load(&path, Some(discrete), &device);
    assert!(matches!(result, Err(BaselinesError::SpaceMismatch { .. })));
}

// ============================================================================
// load_parameters
// ============================================================================

#[test]
fn test_exact_load_requires_every_parameter() {
    let device = Default::default();
    let mut model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();
    let before = model.get_policy_parameters().unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let mut partial = rand_like_map(&before, &mut rng);
    partial.remove("log_std");
    partial.remove("value_net.bias");

    match model.load_parameters(&partial) {
        Err(BaselinesError::MissingParameters(names)) => {
            assert_eq!(names, vec!["log_std".to_string(), "value_net.bias".to_string()]);
        }
        other => panic!("expected MissingParameters, got {:?}", other.err()),
    }
    assert_eq!(model.get_policy_parameters().unwrap(), before);

    model.load_parameters_with(&partial, false).unwrap();
    let after = model.get_policy_parameters().unwrap();
    assert_eq!(after["log_std"], before["log_std"]);
    assert_eq!(after["value_net.bias"], before["value_net.bias"]);
    assert_eq!(after["action_net.weight"], partial["action_net.weight"]);
}

#[test]
fn test_load_parameters_rejects_bad_shapes_and_names() {
    let device = Default::default();
    let mut model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();
    let before = model.get_policy_parameters().unwrap();

    let mut wrong_shape = before.clone();
    let weight = wrong_shape.get_mut("action_net.weight").unwrap();
    weight.shape = vec![weight.numel()];
    assert!(matches!(
        model.load_parameters(&wrong_shape),
        Err(BaselinesError::ShapeMismatch { .. })
    ));

    let mut unknown = before.clone();
    unknown.insert("critic.weight".to_string(), before["value_net.weight"].clone());
    assert!(matches!(
        model.load_parameters_with(&unknown, false),
        Err(BaselinesError::UnexpectedParameters(_))
    ));

    assert_eq!(model.get_policy_parameters().unwrap(), before);
}

#[test]
fn test_loaded_parameters_are_trainable() {
    let device = Default::default();
    let mut model = PPO::<B>::new(identity_box_env(), small_ppo_config(), &device).unwrap();

    let mut rng = StdRng::seed_from_u64(9);
    let random_params = rand_like_map(&model.get_policy_parameters().unwrap(), &mut rng);
    model.load_parameters(&random_params).unwrap();
    model.learn(32, LearnOptions::new()).unwrap();

    let trained = model.get_policy_parameters().unwrap();
    assert!(random_params
        .iter()
        .any(|(name, tensor)| trained[name] != *tensor));
}
