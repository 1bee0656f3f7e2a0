//! Training loggers.
//!
//! Provides different logging backends for training metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Metrics for one training iteration (one rollout plus its update).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSnapshot {
    /// Completed rollout/update iterations.
    pub iteration: usize,
    /// Total environment steps.
    pub timesteps: usize,
    /// Number of completed episodes.
    pub episodes: usize,
    /// Mean reward of the most recent episodes.
    pub ep_rew_mean: Option<f32>,
    /// Mean length of the most recent episodes.
    pub ep_len_mean: Option<f32>,
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy_loss: f32,
    /// Mean approximate KL between the rollout policy and the updated one.
    pub approx_kl: Option<f32>,
    /// Fraction of samples whose ratio was clipped.
    pub clip_fraction: Option<f32>,
    pub explained_variance: f32,
    pub learning_rate: f64,
    /// Mean reward of the latest evaluation, if one ran this iteration.
    pub eval_mean_reward: Option<f32>,
}

impl TrainingSnapshot {
    /// Create a new training snapshot.
    pub fn new(iteration: usize, timesteps: usize, episodes: usize) -> Self {
        Self {
            iteration,
            timesteps,
            episodes,
            explained_variance: f32::NAN,
            ..Default::default()
        }
    }

    /// Set episode statistics.
    pub fn with_episode_stats(mut self, ep_rew_mean: Option<f32>, ep_len_mean: Option<f32>) -> Self {
        self.ep_rew_mean = ep_rew_mean;
        self.ep_len_mean = ep_len_mean;
        self
    }

    /// Set loss values.
    pub fn with_losses(mut self, policy_loss: f32, value_loss: f32, entropy_loss: f32) -> Self {
        self.policy_loss = policy_loss;
        self.value_loss = value_loss;
        self.entropy_loss = entropy_loss;
        self
    }

    /// Set learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set evaluation reward.
    pub fn with_eval_mean_reward(mut self, reward: Option<f32>) -> Self {
        self.eval_mean_reward = reward;
        self
    }
}

fn fmt_opt(value: Option<f32>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    /// Log a training snapshot.
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger with pretty formatting.
pub struct ConsoleLogger {
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a new console logger.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            show_header: true,
        }
    }

    /// Reset the start time.
    pub fn reset_timer(&mut self) {
        self.start_time = Instant::now();
    }

    fn print_header(&self) {
        println!(
            "{:>6} {:>10} {:>8} {:>10} {:>8} {:>10} {:>10} {:>10} {:>8} {:>8} {:>8}",
            "Iter", "Timesteps", "Episodes", "EpRewMean", "EpLen", "Policy", "Value", "Entropy", "KL", "ExplVar", "FPS"
        );
        println!("{}", "-".repeat(108));
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let elapsed = self.start_time.elapsed().as_secs_f32();
        let fps = if elapsed > 0.0 {
            snapshot.timesteps as f32 / elapsed
        } else {
            0.0
        };

        println!(
            "{:>6} {:>10} {:>8} {:>10} {:>8} {:>10.4} {:>10.4} {:>10.4} {:>8} {:>8.3} {:>8.0}",
            snapshot.iteration,
            snapshot.timesteps,
            snapshot.episodes,
            fmt_opt(snapshot.ep_rew_mean, 2),
            fmt_opt(snapshot.ep_len_mean, 1),
            snapshot.policy_loss,
            snapshot.value_loss,
            snapshot.entropy_loss,
            fmt_opt(snapshot.approx_kl, 4),
            snapshot.explained_variance,
            fps
        );
        if let Some(reward) = snapshot.eval_mean_reward {
            println!("{:>6} eval mean reward {:.2}", "", reward);
        }
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

/// CSV file logger for analysis.
pub struct CSVLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CSVLogger {
    /// Create a new CSV logger, truncating `path`.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "iteration,timesteps,episodes,ep_rew_mean,ep_len_mean,policy_loss,value_loss,entropy_loss,approx_kl,clip_fraction,explained_variance,learning_rate,eval_mean_reward,elapsed_secs"
        )?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

impl MetricsLogger for CSVLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let opt = |v: Option<f32>| v.map(|x| x.to_string()).unwrap_or_default();
        let elapsed = self.start_time.elapsed().as_secs_f32();

        let _ = writeln!(
            self.writer,
            "{},{},{},{},{},{:.6},{:.6},{:.6},{},{},{:.4},{:.8},{},{:.2}",
            snapshot.iteration,
            snapshot.timesteps,
            snapshot.episodes,
            opt(snapshot.ep_rew_mean),
            opt(snapshot.ep_len_mean),
            snapshot.policy_loss,
            snapshot.value_loss,
            snapshot.entropy_loss,
            opt(snapshot.approx_kl),
            opt(snapshot.clip_fraction),
            snapshot.explained_variance,
            snapshot.learning_rate,
            opt(snapshot.eval_mean_reward),
            elapsed
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CSVLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Multi-logger that writes to multiple backends.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    /// Create a new multi-logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a logger.
    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    /// Add an already boxed logger.
    pub fn add_boxed(mut self, logger: Box<dyn MetricsLogger>) -> Self {
        self.loggers.push(logger);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
