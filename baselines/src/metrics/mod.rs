//! Training metrics and logging.
//!
//! ## Metrics
//!
//! - [`EpisodeStats`]: per-environment episode returns and lengths
//! - [`TrainingSnapshot`]: everything reported after one training iteration
//!
//! ## Loggers
//!
//! - [`ConsoleLogger`]: Pretty-printed console output
//! - [`CSVLogger`]: CSV file logging for analysis
//! - [`MultiLogger`]: Combine multiple loggers

pub mod logger;
pub mod training_metrics;

pub use logger::{CSVLogger, ConsoleLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
pub use training_metrics::{EpisodeStats, EPISODE_WINDOW};
