//! Periodic model archives during `learn`.
//!
//! The checkpointer decides when to save and where; the model writes the
//! archive itself. It keeps a bounded history of periodic checkpoints and
//! tracks the best evaluation reward seen so far.

use std::fs;
use std::path::PathBuf;

use crate::archive::ARCHIVE_EXTENSION;
use crate::error::{ConfigError, Result};

/// File name of the best-model archive inside the checkpoint directory.
pub const BEST_MODEL_FILE: &str = "best_model.zip";

/// Configuration for the checkpointer.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointConfig {
    /// Directory to store checkpoints.
    pub dir: PathBuf,
    /// Environment steps between periodic saves.
    pub save_freq: usize,
    /// Number of recent checkpoints to keep (0 = keep all).
    pub keep_last_n: usize,
    /// Save `best_model.zip` whenever evaluation improves.
    pub save_best: bool,
    /// File name prefix for periodic checkpoints.
    pub name_prefix: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./checkpoints"),
            save_freq: 10_000,
            keep_last_n: 5,
            save_best: true,
            name_prefix: "rl_model".to_string(),
        }
    }
}

impl CheckpointConfig {
    /// Create a new config with specified checkpoint directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    pub fn with_save_freq(mut self, save_freq: usize) -> Self {
        self.save_freq = save_freq;
        self
    }

    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }

    pub fn with_save_best(mut self, save_best: bool) -> Self {
        self.save_best = save_best;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.save_freq == 0 {
            return Err(ConfigError::InvalidCount {
                field: "save_freq",
                value: 0,
            });
        }
        Ok(())
    }
}

/// Checkpoint metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    /// Path to the archive.
    pub path: PathBuf,
    /// Environment steps at save time.
    pub timesteps: usize,
    /// Evaluation reward at save time, if known.
    pub metric: Option<f32>,
}

/// Tracks when and where to write checkpoints.
#[derive(Debug)]
pub struct Checkpointer {
    config: CheckpointConfig,
    best_metric: f32,
    last_saved: usize,
    checkpoint_history: Vec<CheckpointInfo>,
}

impl Checkpointer {
    /// Create a new checkpointer.
    ///
    /// Creates the checkpoint directory if it doesn't exist.
    pub fn new(config: CheckpointConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.dir)?;

        Ok(Self {
            config,
            best_metric: f32::NEG_INFINITY,
            last_saved: 0,
            checkpoint_history: Vec::new(),
        })
    }

    /// Start counting save intervals from `timesteps`.
    pub fn with_start(mut self, timesteps: usize) -> Self {
        self.last_saved = timesteps;
        self
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Whether `save_freq` steps have passed since the last save.
    pub fn should_save(&self, timesteps: usize) -> bool {
        timesteps >= self.last_saved + self.config.save_freq
    }

    /// Archive path for a periodic checkpoint at `timesteps`.
    pub fn checkpoint_path(&self, timesteps: usize) -> PathBuf {
        self.config.dir.join(format!(
            "{}_{:08}_steps.{}",
            self.config.name_prefix, timesteps, ARCHIVE_EXTENSION
        ))
    }

    /// Archive path of the best model.
    pub fn best_model_path(&self) -> PathBuf {
        self.config.dir.join(BEST_MODEL_FILE)
    }

    /// Register a written checkpoint and prune old ones.
    pub fn record(&mut self, path: PathBuf, timesteps: usize, metric: Option<f32>) -> Result<()> {
        log::info!("Saved checkpoint at {} timesteps to {}", timesteps, path.display());
        self.checkpoint_history.push(CheckpointInfo {
            path,
            timesteps,
            metric,
        });
        self.last_saved = timesteps;
        self.cleanup_old_checkpoints()
    }

    /// Whether `metric` beats the best evaluation so far and should be saved.
    pub fn is_new_best(&self, metric: f32) -> bool {
        self.config.save_best && metric > self.best_metric
    }

    /// Remember `metric` as the best evaluation.
    pub fn mark_best(&mut self, metric: f32) {
        log::info!("New best mean reward {:.3}", metric);
        self.best_metric = metric;
    }

    /// Get the current best metric value.
    pub fn best_metric(&self) -> f32 {
        self.best_metric
    }

    /// Checkpoints written by this checkpointer, oldest first.
    pub fn history(&self) -> &[CheckpointInfo] {
        &self.checkpoint_history
    }

    /// List periodic checkpoints present in the directory, oldest first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let prefix = format!("{}_", self.config.name_prefix);
        let suffix = format!("_steps.{}", ARCHIVE_EXTENSION);

        let mut checkpoints: Vec<CheckpointInfo> = fs::read_dir(&self.config.dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let filename = path.file_name()?.to_str()?;
                let timesteps = filename
                    .strip_prefix(prefix.as_str())?
                    .strip_suffix(suffix.as_str())?
                    .parse()
                    .ok()?;
                Some(CheckpointInfo {
                    path,
                    timesteps,
                    metric: None,
                })
            })
            .collect();

        checkpoints.sort_by_key(|c| c.timesteps);
        Ok(checkpoints)
    }

    /// Most recent periodic checkpoint in the directory.
    pub fn find_latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        Ok(self.list_checkpoints()?.pop())
    }

    fn cleanup_old_checkpoints(&mut self) -> Result<()> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }

        while self.checkpoint_history.len() > self.config.keep_last_n {
            let old = self.checkpoint_history.remove(0);
            if old.path.file_name().and_then(|n| n.to_str()) != Some(BEST_MODEL_FILE) {
                if let Err(e) = fs::remove_file(&old.path) {
                    log::warn!("Could not remove old checkpoint {}: {}", old.path.display(), e);
                }
            }
        }

        Ok(())
    }
}
