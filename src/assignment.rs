use std::iter;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::mode::{FailureMode, ModeTable};
use crate::SynthError;

/// Failure-mode label for every trajectory, indexed by trajectory id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryAssignment {
    modes: Vec<FailureMode>,
}

impl TrajectoryAssignment {
    /// Concatenates the `normal` majority with each mode's quota, then shuffles.
    pub fn build<R: Rng + ?Sized>(
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Result<Self, SynthError> {
        let remainder = config
            .trajectories
            .checked_sub(config.quota_total())
            .ok_or_else(|| {
                SynthError::InvalidConfig(format!(
                    "mode quotas sum to {} but only {} trajectories are configured",
                    config.quota_total(),
                    config.trajectories
                ))
            })?;

        let mut modes = Vec::with_capacity(config.trajectories);
        modes.extend(iter::repeat(FailureMode::Normal).take(remainder));
        for mode in FailureMode::ALL {
            let quota = config.quotas.get(&mode).copied().unwrap_or(0);
            modes.extend(iter::repeat(mode).take(quota));
        }

        modes.shuffle(rng);
        Ok(Self { modes })
    }

    pub fn from_modes(modes: Vec<FailureMode>) -> Self {
        Self { modes }
    }

    pub fn modes(&self) -> &[FailureMode] {
        &self.modes
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn count(&self, mode: FailureMode) -> usize {
        self.modes.iter().filter(|&&m| m == mode).count()
    }

    pub fn counts(&self) -> ModeTable<usize> {
        let mut counts = ModeTable::new();
        for &mode in &self.modes {
            *counts.entry(mode).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn default_assignment_meets_quotas() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        let assignment = TrajectoryAssignment::build(&config, &mut rng).unwrap();

        assert_eq!(assignment.len(), 68);
        assert_eq!(assignment.count(FailureMode::Normal), 40);
        assert_eq!(assignment.count(FailureMode::Incipient), 8);
        assert_eq!(assignment.count(FailureMode::Recovering), 8);
        assert_eq!(assignment.count(FailureMode::Terminal), 12);
    }

    #[test]
    fn assignment_is_shuffled_and_reproducible() {
        let config = SimulationConfig::default();
        let a = TrajectoryAssignment::build(&config, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = TrajectoryAssignment::build(&config, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);

        let sorted_prefix = a.modes()[..40].iter().all(|&m| m == FailureMode::Normal);
        assert!(!sorted_prefix);
    }

    #[test]
    fn quotas_exceeding_trajectories_are_rejected() {
        let config = SimulationConfig {
            trajectories: 10,
            ..SimulationConfig::default()
        };
        let err = TrajectoryAssignment::build(&config, &mut ChaCha8Rng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, SynthError::InvalidConfig(_)));
    }

    #[test]
    fn counts_cover_every_trajectory() {
        let config = SimulationConfig {
            trajectories: 30,
            ..SimulationConfig::default()
        };
        let assignment =
            TrajectoryAssignment::build(&config, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let counts = assignment.counts();
        assert_eq!(counts.values().sum::<usize>(), 30);
        assert_eq!(counts.get(&FailureMode::Normal), Some(&2));
    }
}
