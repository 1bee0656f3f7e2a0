//! Actor-critic MLP policy.
//!
//! ```text
//! features ─► shared_net (Linear + activation)* ─► latent ─┬─► action_net ─► distribution
//!                                                          └─► value_net  ─► V(s)
//! ```
//!
//! Box action spaces add a state-independent `log_std` parameter, so the
//! policy outputs a diagonal Gaussian. Discrete action spaces output
//! categorical logits.

use burn::module::{Ignored, Module, Param};
use burn::prelude::*;
use burn::tensor::activation::{relu, tanh};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::distributions::ActionDistribution;
use crate::error::{BaselinesError, ConfigError, Result};
use crate::nn::{OrthogonalLinear, OrthogonalLinearConfig};
use crate::spaces::Space;

/// Hidden-layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Tanh,
    Relu,
}

impl Activation {
    /// Apply the activation elementwise.
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Tanh => tanh(x),
            Activation::Relu => relu(x),
        }
    }
}

/// Architecture of an [`ActorCriticPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Hidden layer widths of the shared extractor.
    pub net_arch: Vec<usize>,
    pub activation: Activation,
    /// Orthogonal initialization with per-head gains.
    pub ortho_init: bool,
    /// Initial value of `log_std` for Box action spaces.
    pub log_std_init: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            net_arch: vec![64, 64],
            activation: Activation::Tanh,
            ortho_init: true,
            log_std_init: 0.0,
        }
    }
}

impl PolicyConfig {
    /// The standard MLP policy: two hidden layers of 64 units with tanh.
    pub fn mlp() -> Self {
        Self::default()
    }

    pub fn with_net_arch(mut self, net_arch: Vec<usize>) -> Self {
        self.net_arch = net_arch;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_ortho_init(mut self, ortho_init: bool) -> Self {
        self.ortho_init = ortho_init;
        self
    }

    pub fn with_log_std_init(mut self, log_std_init: f32) -> Self {
        self.log_std_init = log_std_init;
        self
    }

    /// Validate the architecture.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(&width) = self.net_arch.iter().find(|&&w| w == 0) {
            return Err(ConfigError::InvalidCount {
                field: "net_arch",
                value: width,
            });
        }
        if !self.log_std_init.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "log_std_init",
                value: self.log_std_init as f64,
                min: -20.0,
                max: 2.0,
            });
        }
        Ok(())
    }

    /// Build a policy for the given spaces with unseeded weights.
    pub fn init<B: Backend>(
        &self,
        observation_space: &Space,
        action_space: &Space,
        device: &B::Device,
    ) -> Result<ActorCriticPolicy<B>> {
        self.init_with_rng(observation_space, action_space, device, &mut StdRng::from_entropy())
    }

    /// Build a policy for the given spaces, drawing initial weights from `rng`.
    pub fn init_with_rng<B: Backend, R: Rng + ?Sized>(
        &self,
        observation_space: &Space,
        action_space: &Space,
        device: &B::Device,
        rng: &mut R,
    ) -> Result<ActorCriticPolicy<B>> {
        self.validate()?;
        observation_space.validate()?;
        action_space.validate()?;

        let features_dim = observation_space.features_dim();
        let hidden_gain = if self.ortho_init {
            std::f64::consts::SQRT_2
        } else {
            1.0
        };

        let mut shared_net = Vec::with_capacity(self.net_arch.len());
        let mut last_dim = features_dim;
        for &width in &self.net_arch {
            shared_net.push(
                OrthogonalLinearConfig::new(last_dim, width)
                    .with_gain(hidden_gain)
                    .with_orthogonal(self.ortho_init)
                    .init_with_rng(device, rng),
            );
            last_dim = width;
        }

        let action_net = OrthogonalLinearConfig::new(last_dim, action_space.action_net_dim())
            .with_gain(0.01)
            .with_orthogonal(self.ortho_init)
            .init_with_rng(device, rng);
        let value_net = OrthogonalLinearConfig::new(last_dim, 1)
            .with_gain(1.0)
            .with_orthogonal(self.ortho_init)
            .init_with_rng(device, rng);

        let log_std = match action_space {
            Space::Box { low, .. } => Some(Param::from_tensor(
                Tensor::ones([low.len()], device) * self.log_std_init,
            )),
            Space::Discrete { .. } => None,
        };

        Ok(ActorCriticPolicy {
            shared_net,
            action_net,
            value_net,
            log_std,
            activation: Ignored(self.activation),
            features_dim,
        })
    }
}

/// Actor-critic policy with a shared MLP extractor.
#[derive(Module, Debug)]
pub struct ActorCriticPolicy<B: Backend> {
    pub(super) shared_net: Vec<OrthogonalLinear<B>>,
    pub(super) action_net: OrthogonalLinear<B>,
    pub(super) value_net: OrthogonalLinear<B>,
    /// Present iff the action space is a Box.
    pub(super) log_std: Option<Param<Tensor<B, 1>>>,
    activation: Ignored<Activation>,
    features_dim: usize,
}

impl<B: Backend> ActorCriticPolicy<B> {
    /// Network input width.
    pub fn features_dim(&self) -> usize {
        self.features_dim
    }

    /// Whether the policy outputs a categorical distribution.
    pub fn is_discrete(&self) -> bool {
        self.log_std.is_none()
    }

    /// Floats per action passed to the environment.
    pub fn action_dim(&self) -> usize {
        if self.is_discrete() {
            1
        } else {
            self.action_net.d_output()
        }
    }

    /// Device holding the parameters.
    pub fn device(&self) -> B::Device {
        self.value_net.weight.val().device()
    }

    /// Shared latent features: [batch, last hidden width].
    pub fn extract(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.shared_net
            .iter()
            .fold(features, |x, layer| self.activation.0.apply(layer.forward(x)))
    }

    /// Action distribution and values [batch, 1].
    pub fn forward(&self, features: Tensor<B, 2>) -> (ActionDistribution<B>, Tensor<B, 2>) {
        let latent = self.extract(features);
        let values = self.value_net.forward(latent.clone());
        (self.distribution_from_latent(latent), values)
    }

    /// Value estimates: [batch].
    pub fn predict_values(&self, features: Tensor<B, 2>) -> Tensor<B, 1> {
        let latent = self.extract(features);
        self.value_net.forward(latent).flatten(0, 1)
    }

    /// Values, log-probabilities and entropy of `actions` [batch, action_dim],
    /// each of shape [batch].
    pub fn evaluate_actions(
        &self,
        features: Tensor<B, 2>,
        actions: Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 1>, Tensor<B, 1>) {
        let (distribution, values) = self.forward(features);
        let log_prob = distribution.log_prob(actions);
        let entropy = distribution.entropy();
        (values.flatten(0, 1), log_prob, entropy)
    }

    fn distribution_from_latent(&self, latent: Tensor<B, 2>) -> ActionDistribution<B> {
        let head = self.action_net.forward(latent);
        match &self.log_std {
            Some(log_std) => ActionDistribution::diag_gaussian(head, log_std.val()),
            None => ActionDistribution::categorical(head),
        }
    }

    /// Features tensor [n_items, features_dim] from raw observations.
    pub fn features_tensor(
        &self,
        observation_space: &Space,
        raw: &[f32],
        n_items: usize,
    ) -> Result<Tensor<B, 2>> {
        let features = observation_space.preprocess(raw, n_items)?;
        if observation_space.features_dim() != self.features_dim {
            return Err(BaselinesError::SpaceMismatch {
                expected: format!("{} features", self.features_dim),
                actual: observation_space.to_string(),
            });
        }
        Ok(Tensor::<B, 1>::from_floats(features.as_slice(), &self.device())
            .reshape([n_items, self.features_dim]))
    }
}
