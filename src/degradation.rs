//! Irreversible ACLR/EVM degradation for latched terminal trajectories.

use rand::Rng;

use crate::config::{DegradationConfig, UniformRange};
use crate::mode::FailureMode;

/// Accumulated bias plus the unit's severity multipliers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationState {
    pub aclr_bias_db: f64,
    pub evm_bias_percent: f64,
    pub aclr_rate: f64,
    pub evm_rate: f64,
}

impl DegradationState {
    pub fn neutral() -> Self {
        Self {
            aclr_bias_db: 0.0,
            evm_bias_percent: 0.0,
            aclr_rate: 1.0,
            evm_rate: 1.0,
        }
    }

    /// Draws the per-unit rate multipliers. Only terminal units vary;
    /// other modes keep neutral rates and consume no randomness.
    pub fn for_trajectory<R: Rng + ?Sized>(
        config: &DegradationConfig,
        mode: FailureMode,
        rng: &mut R,
    ) -> Self {
        if !mode.is_terminal() {
            return Self::neutral();
        }

        Self {
            aclr_rate: draw(rng, config.aclr_rate_multiplier),
            evm_rate: draw(rng, config.evm_rate_multiplier),
            ..Self::neutral()
        }
    }

    /// Grow both biases by one step. Callers gate this on terminal +
    /// fault-active; the increments are never negative.
    pub fn accumulate<R: Rng + ?Sized>(
        &mut self,
        config: &DegradationConfig,
        amplitude: f64,
        rng: &mut R,
    ) {
        let aclr_jitter = draw(rng, config.aclr_jitter);
        let evm_jitter = draw(rng, config.evm_jitter);

        self.aclr_bias_db += aclr_jitter + config.base_aclr_rate * amplitude * self.aclr_rate;
        self.evm_bias_percent += evm_jitter + config.base_evm_rate * amplitude * self.evm_rate;
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, range: UniformRange) -> f64 {
    rng.gen_range(range.low..range.high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn non_terminal_modes_get_neutral_rates() {
        let config = DegradationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for mode in [FailureMode::Normal, FailureMode::Incipient, FailureMode::Recovering] {
            assert_eq!(
                DegradationState::for_trajectory(&config, mode, &mut rng),
                DegradationState::neutral()
            );
        }
    }

    #[test]
    fn terminal_rates_fall_in_configured_ranges() {
        let config = DegradationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..256 {
            let state = DegradationState::for_trajectory(&config, FailureMode::Terminal, &mut rng);
            assert!((0.8..1.4).contains(&state.aclr_rate));
            assert!((0.7..1.5).contains(&state.evm_rate));
            assert_eq!(state.aclr_bias_db, 0.0);
            assert_eq!(state.evm_bias_percent, 0.0);
        }
    }

    #[test]
    fn one_step_increment_is_jitter_plus_scaled_base() {
        let config = DegradationConfig {
            aclr_jitter: UniformRange::new(0.0, 1e-12),
            evm_jitter: UniformRange::new(0.0, 1e-12),
            ..DegradationConfig::default()
        };
        let mut state = DegradationState {
            aclr_rate: 1.2,
            evm_rate: 0.9,
            ..DegradationState::neutral()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        state.accumulate(&config, 2.0, &mut rng);

        approx::assert_abs_diff_eq!(state.aclr_bias_db, 2.5e-4 * 2.0 * 1.2, epsilon = 1e-11);
        approx::assert_abs_diff_eq!(state.evm_bias_percent, 1.5e-4 * 2.0 * 0.9, epsilon = 1e-11);
    }

    proptest! {
        #[test]
        fn biases_never_decrease(seed in any::<u64>(), amplitudes in prop::collection::vec(1.0f64..3.0, 1..200)) {
            let config = DegradationConfig::default();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut state = DegradationState::for_trajectory(&config, FailureMode::Terminal, &mut rng);

            for amplitude in amplitudes {
                let before = state;
                state.accumulate(&config, amplitude, &mut rng);
                prop_assert!(state.aclr_bias_db > before.aclr_bias_db);
                prop_assert!(state.evm_bias_percent > before.evm_bias_percent);
            }
        }
    }
}
