//! Episode statistics gathered while collecting rollouts.

use std::collections::VecDeque;

/// Number of recent episodes averaged for `ep_rew_mean` / `ep_len_mean`.
pub const EPISODE_WINDOW: usize = 100;

/// Running episode returns and lengths for a set of vectorized environments.
#[derive(Debug, Clone)]
pub struct EpisodeStats {
    current_rewards: Vec<f32>,
    current_lengths: Vec<usize>,
    recent_rewards: VecDeque<f32>,
    recent_lengths: VecDeque<usize>,
    episodes: usize,
}

impl EpisodeStats {
    /// Track `n_envs` environments.
    pub fn new(n_envs: usize) -> Self {
        Self {
            current_rewards: vec![0.0; n_envs],
            current_lengths: vec![0; n_envs],
            recent_rewards: VecDeque::with_capacity(EPISODE_WINDOW),
            recent_lengths: VecDeque::with_capacity(EPISODE_WINDOW),
            episodes: 0,
        }
    }

    /// Record one vectorized step.
    pub fn update(&mut self, rewards: &[f32], dones: &[bool]) {
        for (i, (&reward, &done)) in rewards.iter().zip(dones.iter()).enumerate() {
            let (Some(r), Some(l)) = (self.current_rewards.get_mut(i), self.current_lengths.get_mut(i))
            else {
                continue;
            };
            *r += reward;
            *l += 1;
            if done {
                let (reward, length) = (*r, *l);
                *r = 0.0;
                *l = 0;
                self.record_episode(reward, length);
            }
        }
    }

    fn record_episode(&mut self, reward: f32, length: usize) {
        if self.recent_rewards.len() == EPISODE_WINDOW {
            self.recent_rewards.pop_front();
            self.recent_lengths.pop_front();
        }
        self.recent_rewards.push_back(reward);
        self.recent_lengths.push_back(length);
        self.episodes += 1;
    }

    /// Total completed episodes.
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Mean reward of the recent window, `None` before the first episode ends.
    pub fn mean_reward(&self) -> Option<f32> {
        if self.recent_rewards.is_empty() {
            return None;
        }
        Some(self.recent_rewards.iter().sum::<f32>() / self.recent_rewards.len() as f32)
    }

    /// Mean length of the recent window.
    pub fn mean_length(&self) -> Option<f32> {
        if self.recent_lengths.is_empty() {
            return None;
        }
        Some(self.recent_lengths.iter().sum::<usize>() as f32 / self.recent_lengths.len() as f32)
    }

    /// Forget in-progress episodes, e.g. after the environments were reset.
    pub fn reset_current(&mut self, n_envs: usize) {
        self.current_rewards = vec![0.0; n_envs];
        self.current_lengths = vec![0; n_envs];
    }

    /// Reset all statistics.
    pub fn reset(&mut self, n_envs: usize) {
        *self = Self::new(n_envs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = EpisodeStats::new(2);
        assert_eq!(stats.episodes(), 0);
        assert!(stats.mean_reward().is_none());
        assert!(stats.mean_length().is_none());
    }

    #[test]
    fn test_episodes_are_tracked_per_env() {
        let mut stats = EpisodeStats::new(2);
        stats.update(&[1.0, 0.5], &[false, false]);
        stats.update(&[1.0, 0.5], &[true, false]);
        assert_eq!(stats.episodes(), 1);
        assert_eq!(stats.mean_reward(), Some(2.0));
        assert_eq!(stats.mean_length(), Some(2.0));

        stats.update(&[0.0, 0.5], &[false, true]);
        assert_eq!(stats.episodes(), 2);
        assert_eq!(stats.mean_reward(), Some(1.75));
        assert_eq!(stats.mean_length(), Some(2.5));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = EpisodeStats::new(1);
        for i in 0..(EPISODE_WINDOW + 10) {
            stats.update(&[i as f32], &[true]);
        }
        assert_eq!(stats.episodes(), EPISODE_WINDOW + 10);
        // Oldest ten episodes (rewards 0..10) were evicted
        let expected = (10..EPISODE_WINDOW + 10).sum::<usize>() as f32 / EPISODE_WINDOW as f32;
        assert!((stats.mean_reward().unwrap() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_reset() {
        let mut stats = EpisodeStats::new(1);
        stats.update(&[1.0], &[true]);
        stats.reset(3);
        assert_eq!(stats.episodes(), 0);
        stats.update(&[1.0, 1.0, 1.0], &[true, true, true]);
        assert_eq!(stats.episodes(), 3);
    }
}
