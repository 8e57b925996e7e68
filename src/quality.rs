//! ACLR and EVM recurrences.
//!
//! ACLR is clipped above at its ceiling only, so degradation can push it
//! arbitrarily low. EVM grows with diminishing returns through the
//! `1 / (1 + evm / scale)` softening factor instead of a hard cap.

use rand::Rng;

use crate::config::{QualityConfig, SimulationConfig};
use crate::noise::{NoiseBank, NoiseTerm};
use crate::state::TrajectoryState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySample {
    pub aclr_db: f64,
    pub evm_percent: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityModel<'a> {
    config: &'a QualityConfig,
}

impl<'a> QualityModel<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self {
            config: &config.quality,
        }
    }

    /// `degradation_db` is subtracted only when the caller passes a terminal fault bias.
    pub fn aclr<R: Rng + ?Sized>(
        &self,
        previous_db: f64,
        rf_power_dbm: f64,
        pa_temperature_c: f64,
        degradation_db: Option<f64>,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> f64 {
        let cfg = self.config;
        let mut aclr = previous_db
            - cfg.aclr_power_slope * (rf_power_dbm - cfg.aclr_power_knee_dbm).max(0.0)
            - cfg.aclr_temp_slope * (pa_temperature_c - cfg.aclr_temp_knee_c).max(0.0)
            + noise.draw(NoiseTerm::Aclr, rng);

        if let Some(bias) = degradation_db {
            aclr -= bias;
        }

        aclr.min(cfg.aclr_ceiling_db)
    }

    pub fn evm_increment(
        &self,
        aclr_db: f64,
        pa_temperature_c: f64,
        aging_factor: f64,
        degradation_percent: f64,
    ) -> f64 {
        let cfg = self.config;
        let physical = cfg.evm_aclr_slope * (cfg.evm_aclr_reference_db - aclr_db).max(0.0)
            + cfg.evm_temp_slope * (pa_temperature_c - cfg.evm_temp_knee_c).max(0.0)
            + cfg.evm_aging_slope * aging_factor;

        physical + degradation_percent
    }

    pub fn softening(&self, previous_percent: f64) -> f64 {
        1.0 / (1.0 + previous_percent / self.config.evm_soft_scale)
    }

    /// With `floor_at_previous` set the result never drops below `previous_percent`.
    pub fn evm<R: Rng + ?Sized>(
        &self,
        previous_percent: f64,
        increment: f64,
        floor_at_previous: bool,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> f64 {
        let mut evm = previous_percent + increment * self.softening(previous_percent);
        evm += noise.draw(NoiseTerm::Evm, rng);

        if floor_at_previous {
            evm = evm.max(previous_percent);
        }
        evm
    }

    /// Computes both metrics and rolls them into `state` as the new previous values.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        state: &mut TrajectoryState,
        rf_power_dbm: f64,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> QualitySample {
        let terminal_fault = state.terminal_fault();
        let aclr_bias = terminal_fault.then_some(state.degradation.aclr_bias_db);

        let aclr_db = self.aclr(
            state.prev_aclr_db,
            rf_power_dbm,
            state.pa_temperature_c,
            aclr_bias,
            noise,
            rng,
        );

        let increment = self.evm_increment(
            aclr_db,
            state.pa_temperature_c,
            state.aging_factor,
            state.degradation.evm_bias_percent,
        );
        let evm_percent = self.evm(state.prev_evm_percent, increment, terminal_fault, noise, rng);

        state.prev_aclr_db = aclr_db;
        state.prev_evm_percent = evm_percent;

        QualitySample {
            aclr_db,
            evm_percent,
        }
    }
}
