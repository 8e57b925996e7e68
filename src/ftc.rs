//! Fault-tolerant-control latch.
//!
//! A stress timer counts up while the amplifier is driven hard and hot, and
//! decays by one per relaxed step. When the timer reaches the mode's
//! threshold the latch trips and stays tripped for the rest of the
//! trajectory. The fault amplitude ramps toward the mode's cap while
//! tripped and relaxes toward 1.0 otherwise.

use serde::Serialize;

use crate::config::FtcConfig;
use crate::mode::{lookup, FailureMode};
use crate::SynthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatchPhase {
    Inactive,
    Accumulating,
    Active,
}

/// Per-mode latch parameters, resolved once per trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatchParams {
    pub stress_power_dbm: f64,
    pub stress_temperature_c: f64,
    /// `None` for modes that never latch
    pub threshold: Option<u32>,
    pub amplitude_cap: f64,
    pub amplitude_step: f64,
}

impl LatchParams {
    pub fn for_mode(config: &FtcConfig, mode: FailureMode) -> Result<Self, SynthError> {
        let threshold = if mode.can_latch() {
            Some(lookup(&config.timer_thresholds, "ftc.timer_thresholds", mode)?)
        } else {
            None
        };

        Ok(Self {
            stress_power_dbm: config.stress_power_dbm,
            stress_temperature_c: config.stress_temperature_c,
            threshold,
            amplitude_cap: lookup(&config.amplitude_caps, "ftc.amplitude_caps", mode)?,
            amplitude_step: config.amplitude_step,
        })
    }

    pub fn is_stressed(&self, rf_power_dbm: f64, pa_temperature_c: f64) -> bool {
        rf_power_dbm >= self.stress_power_dbm && pa_temperature_c > self.stress_temperature_c
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultLatch {
    pub timer: u32,
    pub active: bool,
    pub amplitude: f64,
}

impl Default for FaultLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultLatch {
    pub fn new() -> Self {
        Self {
            timer: 0,
            active: false,
            amplitude: 1.0,
        }
    }

    pub fn phase(&self) -> LatchPhase {
        if self.active {
            LatchPhase::Active
        } else if self.timer > 0 {
            LatchPhase::Accumulating
        } else {
            LatchPhase::Inactive
        }
    }

    /// Advance the latch by one step. Returns `true` on the step the latch trips.
    pub fn observe(&mut self, params: &LatchParams, rf_power_dbm: f64, pa_temperature_c: f64) -> bool {
        if params.is_stressed(rf_power_dbm, pa_temperature_c) {
            self.timer = self.timer.saturating_add(1);
        } else {
            self.timer = self.timer.saturating_sub(1);
        }

        let was_active = self.active;
        if let Some(threshold) = params.threshold {
            if self.timer >= threshold {
                self.active = true;
            }
        }

        self.amplitude = if self.active {
            (self.amplitude + params.amplitude_step).min(params.amplitude_cap)
        } else {
            (self.amplitude - params.amplitude_step).max(1.0)
        };

        self.active && !was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(mode: FailureMode) -> LatchParams {
        LatchParams::for_mode(&FtcConfig::default(), mode).expect("default ftc tables")
    }

    #[test]
    fn terminal_latches_after_sustained_stress() {
        let params = params(FailureMode::Terminal);
        let mut latch = FaultLatch::new();

        for step in 1..=1199 {
            assert!(!latch.observe(&params, 10.0, 65.0), "tripped early at {step}");
            assert_eq!(latch.phase(), LatchPhase::Accumulating);
        }
        assert!(latch.observe(&params, 10.0, 65.0));
        assert_eq!(latch.timer, 1200);
        assert_eq!(latch.phase(), LatchPhase::Active);

        for _ in 0..5000 {
            assert!(!latch.observe(&params, 0.0, 20.0));
            assert!(latch.active);
        }
        assert_eq!(latch.timer, 0);
    }

    #[test]
    fn normal_mode_never_latches() {
        let params = params(FailureMode::Normal);
        let mut latch = FaultLatch::new();

        for _ in 0..20_000 {
            assert!(!latch.observe(&params, 10.0, 90.0));
        }
        assert!(!latch.active);
        assert_eq!(latch.timer, 20_000);
        assert_eq!(latch.amplitude, 1.0);
    }

    #[test]
    fn momentary_stress_decays_without_tripping() {
        let params = params(FailureMode::Incipient);
        let mut latch = FaultLatch::new();

        for _ in 0..10 {
            for _ in 0..200 {
                latch.observe(&params, 10.0, 70.0);
            }
            for _ in 0..200 {
                latch.observe(&params, 10.0, 50.0);
            }
        }
        assert!(!latch.active);
        assert_eq!(latch.phase(), LatchPhase::Inactive);
    }

    #[test]
    fn stress_requires_both_power_and_temperature() {
        let params = params(FailureMode::Terminal);
        assert!(params.is_stressed(9.5, 60.1));
        assert!(!params.is_stressed(9.4, 90.0));
        assert!(!params.is_stressed(10.0, 60.0));
    }

    #[test]
    fn amplitude_ramps_to_cap() {
        let params = params(FailureMode::Incipient);
        let mut latch = FaultLatch::new();
        for _ in 0..2000 {
            latch.observe(&params, 10.0, 70.0);
        }
        approx::assert_abs_diff_eq!(latch.amplitude, 1.25, epsilon = 1e-12);
    }

    fn any_mode() -> impl Strategy<Value = FailureMode> {
        prop::sample::select(FailureMode::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn latch_invariants_hold_for_any_stress_sequence(
            mode in any_mode(),
            stress in prop::collection::vec(any::<bool>(), 0..3000),
        ) {
            let params = LatchParams {
                threshold: params(mode).threshold.map(|t| t / 10),
                ..params(mode)
            };
            let mut latch = FaultLatch::new();
            let mut was_active = false;

            for stressed in stress {
                let temperature = if stressed { 75.0 } else { 40.0 };
                latch.observe(&params, 10.0, temperature);

                prop_assert!(latch.amplitude >= 1.0);
                prop_assert!(latch.amplitude <= params.amplitude_cap);
                prop_assert!(!was_active || latch.active);
                if mode == FailureMode::Normal {
                    prop_assert!(!latch.active);
                }
                was_active = latch.active;
            }
        }
    }
}
