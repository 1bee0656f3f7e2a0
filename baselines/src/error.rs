//! Error types for model construction, training and persistence.

use std::io;

use thiserror::Error;

/// Configuration validation error.
///
/// Returned when hyperparameters are invalid or inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A count parameter (n_steps, n_epochs, etc.) must be positive.
    #[error("{field} must be > 0, got {value}")]
    InvalidCount { field: &'static str, value: usize },

    /// A parameter is outside its valid range.
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The minibatch size is larger than one rollout.
    #[error("batch_size ({batch_size}) must be <= n_steps * n_envs ({rollout_size})")]
    InvalidBatchSize {
        batch_size: usize,
        rollout_size: usize,
    },
}

/// Errors raised by models, environments and archives.
#[derive(Debug, Error)]
pub enum BaselinesError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Burn recorder failed to serialize or deserialize a record.
    #[error("Recorder error: {0}")]
    Recorder(String),

    /// The archive file is malformed or of an unknown format.
    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// `load_parameters` with exact matching was given an incomplete mapping.
    #[error("Missing parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    /// `load_parameters` was given names the policy does not have.
    #[error("Unexpected parameters: {}", .0.join(", "))]
    UnexpectedParameters(Vec<String>),

    #[error("Shape mismatch for parameter '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Sub-environments or a replacement environment disagree on spaces.
    #[error("Space mismatch: expected {expected}, got {actual}")]
    SpaceMismatch { expected: String, actual: String },

    /// `learn` was called on a model that has no environment attached.
    #[error("No environment attached to the model; call set_env first")]
    NoEnvironment,

    /// `create_eval_env` was requested but the environment cannot be copied.
    #[error("The environment cannot spawn a copy for evaluation")]
    EvalEnvUnavailable,

    #[error("Archive holds a {found} model, cannot load it as {expected}")]
    AlgorithmMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Unsupported space: {0}")]
    UnsupportedSpace(String),

    /// Tensor data could not be read back from the backend.
    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

impl From<bincode::Error> for BaselinesError {
    fn from(e: bincode::Error) -> Self {
        BaselinesError::Bincode(e.to_string())
    }
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, BaselinesError>;
