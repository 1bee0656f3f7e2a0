//! Named access to policy parameters.
//!
//! Parameters are exposed as an ordered map from a stable name to an owned
//! copy of the values:
//!
//! | Name | Shape |
//! |---|---|
//! | `mlp_extractor.shared_net.{i}.weight` | `[hidden_i, input_i]` |
//! | `mlp_extractor.shared_net.{i}.bias` | `[hidden_i]` |
//! | `action_net.weight` / `action_net.bias` | `[n_out, last_hidden]` / `[n_out]` |
//! | `value_net.weight` / `value_net.bias` | `[1, last_hidden]` / `[1]` |
//! | `log_std` (Box actions only) | `[action_dim]` |
//!
//! Mutating a [`ParameterMap`] never touches the policy; the values only flow
//! back through [`ActorCriticPolicy::load_parameters`].

use std::collections::BTreeMap;

use burn::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::actor_critic::ActorCriticPolicy;
use crate::error::{BaselinesError, Result};
use crate::nn::OrthogonalLinear;

/// Ordered mapping from parameter name to values.
pub type ParameterMap = BTreeMap<String, ParameterTensor>;

/// Owned, row-major copy of one parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl ParameterTensor {
    /// Create a tensor, checking that `values` fills `shape`.
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != values.len() {
            return Err(BaselinesError::Tensor(format!(
                "{} values cannot fill shape {:?}",
                values.len(),
                shape
            )));
        }
        Ok(Self { shape, values })
    }

    /// Copy the values out of a backend tensor.
    pub fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Self> {
        let shape = tensor.dims().to_vec();
        let values = tensor_values(tensor)?;
        Self::new(shape, values)
    }

    /// Build a backend tensor with these values.
    pub fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Tensor<B, D> {
        Tensor::from_data(TensorData::new(self.values.clone(), self.shape.clone()), device)
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.values.len()
    }

    /// Same shape, all zeros.
    pub fn zeros_like(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            values: vec![0.0; self.values.len()],
        }
    }

    /// Same shape, values uniform in `[0, 1)`.
    pub fn rand_like<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        Self {
            shape: self.shape.clone(),
            values: (0..self.values.len()).map(|_| rng.gen::<f32>()).collect(),
        }
    }

    /// Largest absolute elementwise difference, `None` when shapes differ.
    pub fn max_abs_diff(&self, other: &Self) -> Option<f32> {
        if self.shape != other.shape {
            return None;
        }
        Some(
            self.values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max),
        )
    }
}

/// Read a tensor back into a flat `Vec<f32>`.
pub(crate) fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| BaselinesError::Tensor(format!("{:?}", e)))
}

/// Replace every tensor of `params` with uniform random values of the same shape.
pub fn rand_like_map<R: Rng + ?Sized>(params: &ParameterMap, rng: &mut R) -> ParameterMap {
    params
        .iter()
        .map(|(name, tensor)| (name.clone(), tensor.rand_like(rng)))
        .collect()
}

fn layer_name(prefix: &str, field: &str) -> String {
    format!("{}.{}", prefix, field)
}

fn shared_prefix(index: usize) -> String {
    format!("mlp_extractor.shared_net.{}", index)
}

impl<B: Backend> ActorCriticPolicy<B> {
    fn named_layers(&self) -> Vec<(String, &OrthogonalLinear<B>)> {
        let mut layers: Vec<(String, &OrthogonalLinear<B>)> = self
            .shared_net
            .iter()
            .enumerate()
            .map(|(i, layer)| (shared_prefix(i), layer))
            .collect();
        layers.push(("action_net".to_string(), &self.action_net));
        layers.push(("value_net".to_string(), &self.value_net));
        layers
    }

    /// Expected shape of every named parameter.
    pub fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
        let mut shapes = BTreeMap::new();
        for (prefix, layer) in self.named_layers() {
            shapes.insert(
                layer_name(&prefix, "weight"),
                vec![layer.d_output(), layer.d_input()],
            );
            if layer.bias.is_some() {
                shapes.insert(layer_name(&prefix, "bias"), vec![layer.d_output()]);
            }
        }
        if let Some(log_std) = &self.log_std {
            shapes.insert("log_std".to_string(), log_std.val().dims().to_vec());
        }
        shapes
    }

    /// Owned copy of every parameter, keyed by name.
    pub fn named_parameters(&self) -> Result<ParameterMap> {
        let mut params = ParameterMap::new();
        for (prefix, layer) in self.named_layers() {
            params.insert(
                layer_name(&prefix, "weight"),
                ParameterTensor::from_tensor(layer.weight.val())?,
            );
            if let Some(bias) = &layer.bias {
                params.insert(
                    layer_name(&prefix, "bias"),
                    ParameterTensor::from_tensor(bias.val())?,
                );
            }
        }
        if let Some(log_std) = &self.log_std {
            params.insert(
                "log_std".to_string(),
                ParameterTensor::from_tensor(log_std.val())?,
            );
        }
        Ok(params)
    }

    /// Overwrite parameters from a named map.
    ///
    /// Unknown names and shape mismatches are always rejected. Names absent
    /// from `params` keep their current values unless `exact_match` is set,
    /// in which case every parameter must be provided. The whole map is
    /// validated before any tensor is replaced, so an error leaves the policy
    /// unchanged.
    pub fn load_parameters(&mut self, params: &ParameterMap, exact_match: bool) -> Result<()> {
        let shapes = self.parameter_shapes();

        let unexpected: Vec<String> = params
            .keys()
            .filter(|name| !shapes.contains_key(*name))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(BaselinesError::UnexpectedParameters(unexpected));
        }

        if exact_match {
            let missing: Vec<String> = shapes
                .keys()
                .filter(|name| !params.contains_key(*name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BaselinesError::MissingParameters(missing));
            }
        }

        for (name, tensor) in params {
            let expected = &shapes[name];
            if &tensor.shape != expected || tensor.numel() != expected.iter().product::<usize>() {
                return Err(BaselinesError::ShapeMismatch {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual: tensor.shape.clone(),
                });
            }
        }

        let device = self.device();
        let load_layer = |layer: OrthogonalLinear<B>, prefix: &str| {
            let mut layer = layer;
            if let Some(weight) = params.get(&layer_name(prefix, "weight")) {
                layer = layer.with_weight(weight.to_tensor(&device));
            }
            if let Some(bias) = params.get(&layer_name(prefix, "bias")) {
                layer = layer.with_bias_values(bias.to_tensor(&device));
            }
            layer
        };

        let mut policy = self.clone();
        policy.shared_net = policy
            .shared_net
            .into_iter()
            .enumerate()
            .map(|(i, layer)| load_layer(layer, &shared_prefix(i)))
            .collect();
        policy.action_net = load_layer(policy.action_net, "action_net");
        policy.value_net = load_layer(policy.value_net, "value_net");
        if let Some(values) = params.get("log_std") {
            let tensor: Tensor<B, 1> = values.to_tensor(&device);
            policy.log_std = policy
                .log_std
                .map(|param| param.map(|_| tensor.require_grad()));
        }

        *self = policy;
        log::debug!("Loaded {} policy parameters", params.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::PolicyConfig;
    use crate::spaces::Space;
    use burn::backend::{Autodiff, NdArray};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn box_policy() -> ActorCriticPolicy<TestBackend> {
        let space = Space::boxed(-1.0, 1.0, 1);
        PolicyConfig::mlp()
            .with_net_arch(vec![16])
            .init(&space, &space, &Default::default())
            .unwrap()
    }

    #[test]
    fn test_parameter_names_and_shapes() {
        let params = box_policy().named_parameters().unwrap();
        let names: Vec<&str> = params.keys().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "action_net.bias",
                "action_net.weight",
                "log_std",
                "mlp_extractor.shared_net.0.bias",
                "mlp_extractor.shared_net.0.weight",
                "value_net.bias",
                "value_net.weight",
            ]
        );
        assert_eq!(params["mlp_extractor.shared_net.0.weight"].shape, vec![16, 1]);
        assert_eq!(params["action_net.weight"].shape, vec![1, 16]);
        assert_eq!(params["value_net.bias"].shape, vec![1]);
        assert_eq!(params["log_std"].shape, vec![1]);
    }

    #[test]
    fn test_discrete_policy_has_no_log_std() {
        let space = Space::discrete(3);
        let policy: ActorCriticPolicy<TestBackend> = PolicyConfig::mlp()
            .init(&space, &space, &Default::default())
            .unwrap();
        let params = policy.named_parameters().unwrap();
        assert!(!params.contains_key("log_std"));
        assert_eq!(params.len(), 8);
    }

    #[test]
    fn test_snapshot_is_an_owned_copy() {
        let policy = box_policy();
        let mut snapshot = policy.named_parameters().unwrap();
        snapshot.get_mut("log_std").unwrap().values[0] = 42.0;
        assert_eq!(policy.named_parameters().unwrap()["log_std"].values, vec![0.0]);
    }

    #[test]
    fn test_load_random_parameters() {
        let mut policy = box_policy();
        let before = policy.named_parameters().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let random = rand_like_map(&before, &mut rng);

        policy.load_parameters(&random, true).unwrap();
        let after = policy.named_parameters().unwrap();
        assert_eq!(after, random);
        assert_ne!(after, before);
    }

    #[test]
    fn test_partial_load_keeps_other_values() {
        let mut policy = box_policy();
        let before = policy.named_parameters().unwrap();
        let mut partial = ParameterMap::new();
        partial.insert("log_std".to_string(), ParameterTensor::new(vec![1], vec![-1.0]).unwrap());

        policy.load_parameters(&partial, false).unwrap();
        let after = policy.named_parameters().unwrap();
        assert_eq!(after["log_std"].values, vec![-1.0]);
        assert_eq!(after["action_net.weight"], before["action_net.weight"]);
    }

    #[test]
    fn test_exact_match_rejects_missing() {
        let mut policy = box_policy();
        let before = policy.named_parameters().unwrap();
        let mut partial = rand_like_map(&before, &mut StdRng::seed_from_u64(1));
        partial.remove("value_net.bias");

        match policy.load_parameters(&partial, true) {
            Err(BaselinesError::MissingParameters(names)) => {
                assert_eq!(names, vec!["value_net.bias".to_string()])
            }
            other => panic!("expected missing parameters, got {:?}", other),
        }
        assert_eq!(policy.named_parameters().unwrap(), before);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let mut policy = box_policy();
        let mut params = ParameterMap::new();
        params.insert("critic.weight".to_string(), ParameterTensor::new(vec![1], vec![0.0]).unwrap());
        assert!(matches!(
            policy.load_parameters(&params, false),
            Err(BaselinesError::UnexpectedParameters(_))
        ));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut policy = box_policy();
        let mut params = ParameterMap::new();
        params.insert(
            "action_net.weight".to_string(),
            ParameterTensor::new(vec![16, 1], vec![0.0; 16]).unwrap(),
        );
        assert!(matches!(
            policy.load_parameters(&params, false),
            Err(BaselinesError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_parameter_tensor_helpers() {
        assert!(ParameterTensor::new(vec![2, 2], vec![0.0; 3]).is_err());

        let t = ParameterTensor::new(vec![2, 3], vec![1.0; 6]).unwrap();
        assert_eq!(t.numel(), 6);
        assert_eq!(t.zeros_like().values, vec![0.0; 6]);

        let mut rng = StdRng::seed_from_u64(3);
        let r = t.rand_like(&mut rng);
        assert_eq!(r.shape, vec![2, 3]);
        assert!(r.values.iter().all(|&v| (0.0..1.0).contains(&v)));
        assert!(t.max_abs_diff(&r).unwrap() > 0.0);
        assert!(t.max_abs_diff(&ParameterTensor::new(vec![6], vec![1.0; 6]).unwrap()).is_none());
    }
}
