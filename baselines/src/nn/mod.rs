//! Neural network building blocks for the policies.
//!
//! - [`orthogonal`]: linear layer with orthogonal initialization

pub mod orthogonal;

pub use orthogonal::{
    generate_orthogonal_weights, standard_normal, OrthogonalLinear, OrthogonalLinearConfig,
};
