//! Actor-critic policies and their parameters.
//!
//! - [`ActorCriticPolicy`]: burn module with a shared MLP extractor and
//!   separate action/value heads
//! - [`ActionDistribution`]: categorical or diagonal Gaussian over actions
//! - [`ParameterMap`]: owned, named snapshot of every policy tensor

pub mod actor_critic;
pub mod distributions;
pub mod parameters;

pub use actor_critic::{Activation, ActorCriticPolicy, PolicyConfig};
pub use distributions::ActionDistribution;
pub use parameters::{rand_like_map, ParameterMap, ParameterTensor};
