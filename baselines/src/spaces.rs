//! Observation and action spaces.
//!
//! Two space kinds are supported:
//! - [`Space::Box`]: a bounded, flat vector of floats
//! - [`Space::Discrete`]: a single index in `[0, n)`
//!
//! Raw values always travel as `f32` slices. A discrete value is stored as its
//! index cast to `f32`, and is one-hot encoded before it reaches a network
//! (see [`Space::preprocess`]).

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{BaselinesError, Result};

/// An observation or action space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Space {
    /// Continuous box with per-dimension bounds.
    Box { low: Vec<f32>, high: Vec<f32> },
    /// Discrete set `{0, 1, ..., n - 1}`.
    Discrete { n: usize },
}

impl Space {
    /// Box space with the same bounds on every dimension.
    pub fn boxed(low: f32, high: f32, dim: usize) -> Self {
        Space::Box {
            low: vec![low; dim],
            high: vec![high; dim],
        }
    }

    /// Discrete space with `n` choices.
    pub fn discrete(n: usize) -> Self {
        Space::Discrete { n }
    }

    /// Whether this is a discrete space.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Space::Discrete { .. })
    }

    /// Number of raw floats describing one element of the space.
    pub fn shape_dim(&self) -> usize {
        match self {
            Space::Box { low, .. } => low.len(),
            Space::Discrete { .. } => 1,
        }
    }

    /// Width of the network input produced by [`Space::preprocess`].
    pub fn features_dim(&self) -> usize {
        match self {
            Space::Box { low, .. } => low.len(),
            Space::Discrete { n } => *n,
        }
    }

    /// Width of the policy head for this action space.
    ///
    /// Discrete: one logit per choice. Box: one mean per dimension.
    pub fn action_net_dim(&self) -> usize {
        self.features_dim()
    }

    /// Draw a uniformly random element.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        match self {
            Space::Box { low, high } => low
                .iter()
                .zip(high.iter())
                .map(|(&l, &h)| {
                    let (lo, hi) = if l <= h { (l, h) } else { (h, l) };
                    if hi > lo {
                        rng.gen_range(lo..=hi)
                    } else {
                        lo
                    }
                })
                .collect(),
            Space::Discrete { n } => {
                if *n == 0 {
                    vec![0.0]
                } else {
                    vec![rng.gen_range(0..*n) as f32]
                }
            }
        }
    }

    /// Whether `value` is an element of this space.
    pub fn contains(&self, value: &[f32]) -> bool {
        match self {
            Space::Box { low, high } => {
                value.len() == low.len()
                    && value
                        .iter()
                        .zip(low.iter().zip(high.iter()))
                        .all(|(&v, (&l, &h))| v >= l && v <= h)
            }
            Space::Discrete { n } => {
                value.len() == 1
                    && value[0] >= 0.0
                    && value[0].fract() == 0.0
                    && (value[0] as usize) < *n
            }
        }
    }

    /// Convert `n_items` raw elements (flat) into network features (flat).
    ///
    /// Box values pass through unchanged. Discrete indices become one-hot rows.
    pub fn preprocess(&self, raw: &[f32], n_items: usize) -> Result<Vec<f32>> {
        let expected = n_items * self.shape_dim();
        if raw.len() != expected {
            return Err(BaselinesError::SpaceMismatch {
                expected: format!("{} values", expected),
                actual: format!("{} values", raw.len()),
            });
        }
        match self {
            Space::Box { .. } => Ok(raw.to_vec()),
            Space::Discrete { n } => {
                let mut features = vec![0.0f32; n_items * n];
                for (i, &idx) in raw.iter().enumerate() {
                    let idx = idx.round();
                    if idx < 0.0 || idx as usize >= *n {
                        return Err(BaselinesError::InvalidAction(format!(
                            "discrete value {} outside [0, {})",
                            idx, n
                        )));
                    }
                    features[i * n + idx as usize] = 1.0;
                }
                Ok(features)
            }
        }
    }

    /// Bring a raw action (one element) inside the space.
    ///
    /// Box: clamp every dimension into its bounds. Discrete: round and clamp
    /// to a valid index.
    pub fn clip_action(&self, action: &mut [f32]) {
        match self {
            Space::Box { low, high } => {
                for ((a, &l), &h) in action.iter_mut().zip(low.iter()).zip(high.iter()) {
                    let (lo, hi) = if l <= h { (l, h) } else { (h, l) };
                    *a = a.clamp(lo, hi);
                }
            }
            Space::Discrete { n } => {
                let max = n.saturating_sub(1) as f32;
                for a in action.iter_mut() {
                    *a = a.round().clamp(0.0, max);
                }
            }
        }
    }

    /// Check that a space can be handled by the actor-critic policies.
    pub fn validate(&self) -> Result<()> {
        match self {
            Space::Box { low, high } => {
                if low.is_empty() || low.len() != high.len() {
                    return Err(BaselinesError::UnsupportedSpace(format!(
                        "box with {} low and {} high bounds",
                        low.len(),
                        high.len()
                    )));
                }
                if low.iter().chain(high.iter()).any(|v| !v.is_finite()) {
                    return Err(BaselinesError::UnsupportedSpace(
                        "box bounds must be finite".to_string(),
                    ));
                }
                Ok(())
            }
            Space::Discrete { n } => {
                if *n == 0 {
                    return Err(BaselinesError::UnsupportedSpace(
                        "discrete space with 0 choices".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Space::Box { low, .. } => write!(f, "Box({})", low.len()),
            Space::Discrete { n } => write!(f, "Discrete({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dims() {
        let b = Space::boxed(-1.0, 1.0, 3);
        assert_eq!(b.shape_dim(), 3);
        assert_eq!(b.features_dim(), 3);

        let d = Space::discrete(5);
        assert_eq!(d.shape_dim(), 1);
        assert_eq!(d.features_dim(), 5);
        assert!(d.is_discrete());
    }

    #[test]
    fn test_preprocess_one_hot() {
        let d = Space::discrete(3);
        let features = d.preprocess(&[2.0, 0.0], 2).unwrap();
        assert_eq!(features, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_rejects_out_of_range() {
        let d = Space::discrete(3);
        assert!(d.preprocess(&[3.0], 1).is_err());
        assert!(d.preprocess(&[1.0, 1.0], 1).is_err());
    }

    #[test]
    fn test_clip_action() {
        let b = Space::boxed(-1.0, 1.0, 2);
        let mut a = [3.0, -0.5];
        b.clip_action(&mut a);
        assert_eq!(a, [1.0, -0.5]);

        let d = Space::discrete(4);
        let mut a = [7.2];
        d.clip_action(&mut a);
        assert_eq!(a, [3.0]);
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        let b = Space::Box {
            low: vec![10.0],
            high: vec![1.0],
        };
        let mut rng = StdRng::seed_from_u64(0);
        let s = b.sample(&mut rng);
        assert!(s[0] >= 1.0 && s[0] <= 10.0);
    }

    #[test]
    fn test_validate() {
        assert!(Space::discrete(0).validate().is_err());
        assert!(Space::boxed(-1.0, 1.0, 0).validate().is_err());
        assert!(Space::boxed(f32::NEG_INFINITY, 1.0, 1).validate().is_err());
        assert!(Space::boxed(-1.0, 1.0, 1).validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_box_samples_are_contained(seed in any::<u64>(), dim in 1usize..6, lo in -5.0f32..0.0, width in 0.0f32..5.0) {
            let space = Space::boxed(lo, lo + width, dim);
            let mut rng = StdRng::seed_from_u64(seed);
            let s = space.sample(&mut rng);
            prop_assert!(space.contains(&s));
        }

        #[test]
        fn prop_discrete_samples_are_contained(seed in any::<u64>(), n in 1usize..50) {
            let space = Space::discrete(n);
            let mut rng = StdRng::seed_from_u64(seed);
            let s = space.sample(&mut rng);
            prop_assert!(space.contains(&s));
        }
    }
}
