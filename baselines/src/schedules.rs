//! Hyperparameter schedules.
//!
//! A schedule maps the remaining training progress (1.0 at the start of
//! `learn`, 0.0 at the end) to a value. Used for the learning rate and the
//! PPO clip range.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A value that may change over the course of training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// Fixed value.
    Constant(f64),
    /// Linear interpolation from `start` (progress 1.0) to `end` (progress 0.0).
    Linear { start: f64, end: f64 },
}

impl Schedule {
    /// Linear decay from `start` to zero.
    pub fn linear_to_zero(start: f64) -> Self {
        Schedule::Linear { start, end: 0.0 }
    }

    /// Value at `progress_remaining`, clamped into `[0, 1]`.
    pub fn value(&self, progress_remaining: f64) -> f64 {
        match *self {
            Schedule::Constant(v) => v,
            Schedule::Linear { start, end } => {
                let p = if progress_remaining.is_finite() {
                    progress_remaining.clamp(0.0, 1.0)
                } else {
                    1.0
                };
                end + (start - end) * p
            }
        }
    }

    /// Value at the start of training.
    pub fn initial(&self) -> f64 {
        self.value(1.0)
    }

    /// Check that every value is finite and non-negative.
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let values = match *self {
            Schedule::Constant(v) => vec![v],
            Schedule::Linear { start, end } => vec![start, end],
        };
        for v in values {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: v,
                    min: 0.0,
                    max: f64::MAX,
                });
            }
        }
        Ok(())
    }
}

impl From<f64> for Schedule {
    fn from(value: f64) -> Self {
        Schedule::Constant(value)
    }
}

/// Remaining progress after `num_timesteps` of `total_timesteps`.
pub fn progress_remaining(num_timesteps: usize, total_timesteps: usize) -> f64 {
    if total_timesteps == 0 {
        return 0.0;
    }
    1.0 - (num_timesteps as f64 / total_timesteps as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constant() {
        let s = Schedule::from(3e-4);
        assert_eq!(s.value(1.0), 3e-4);
        assert_eq!(s.value(0.0), 3e-4);
    }

    #[test]
    fn test_linear_endpoints() {
        let s = Schedule::Linear { start: 1.0, end: 0.1 };
        assert!((s.value(1.0) - 1.0).abs() < 1e-12);
        assert!((s.value(0.0) - 0.1).abs() < 1e-12);
        assert!((s.value(0.5) - 0.55).abs() < 1e-12);
        assert_eq!(s.initial(), 1.0);
    }

    #[test]
    fn test_linear_clamps_progress() {
        let s = Schedule::linear_to_zero(2.0);
        assert_eq!(s.value(5.0), 2.0);
        assert_eq!(s.value(-1.0), 0.0);
        assert_eq!(s.value(f64::NAN), 2.0);
    }

    #[test]
    fn test_validate() {
        assert!(Schedule::Constant(-1.0).validate("learning_rate").is_err());
        assert!(Schedule::Linear { start: 1.0, end: f64::NAN }
            .validate("clip_range")
            .is_err());
        assert!(Schedule::Constant(0.2).validate("clip_range").is_ok());
    }

    #[test]
    fn test_progress_remaining() {
        assert_eq!(progress_remaining(0, 100), 1.0);
        assert_eq!(progress_remaining(50, 100), 0.5);
        assert_eq!(progress_remaining(150, 100), 0.0);
        assert_eq!(progress_remaining(0, 0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_linear_stays_between_endpoints(start in 0.0f64..10.0, end in 0.0f64..10.0, p in -1.0f64..2.0) {
            let v = Schedule::Linear { start, end }.value(p);
            prop_assert!(v >= start.min(end) - 1e-9);
            prop_assert!(v <= start.max(end) + 1e-9);
        }
    }
}
