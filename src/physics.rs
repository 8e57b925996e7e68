//! Electrical, thermal and RF recurrence for one amplifier step.
//!
//! Evaluated in data-dependency order: supply current, temperature,
//! compression and measured output, then frequency error.

use rand::Rng;

use crate::config::{PhysicsConfig, SimulationConfig};
use crate::exogenous::ExogenousSample;
use crate::noise::{NoiseBank, NoiseTerm};
use crate::state::TrajectoryState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsSample {
    pub supply_current_a: f64,
    pub pa_temperature_c: f64,
    pub compression_db: f64,
    pub measured_rf_output_dbm: f64,
    pub freq_error_internal_hz: f64,
    pub freq_error_external_hz: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PhysicsModel<'a> {
    config: &'a PhysicsConfig,
    thermal_gain_c: f64,
}

impl<'a> PhysicsModel<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self {
            config: &config.physics,
            thermal_gain_c: config.ftc.thermal_gain_c,
        }
    }

    /// Exactly zero while RF is off; no noise is drawn in that case.
    pub fn supply_current<R: Rng + ?Sized>(
        &self,
        input: &ExogenousSample,
        aging_factor: f64,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> f64 {
        if !input.rf_on {
            return 0.0;
        }

        let cfg = self.config;
        cfg.idle_current_a
            + cfg.k_power_current * input.rf_power_dbm
            + cfg.k_aging_current * aging_factor
            + noise.draw(NoiseTerm::Current, rng)
    }

    /// `runaway_amplitude` is the fault amplitude when a terminal latch is
    /// active, which adds heating on top of the dissipation balance.
    pub fn temperature<R: Rng + ?Sized>(
        &self,
        previous_c: f64,
        input: &ExogenousSample,
        supply_current_a: f64,
        runaway_amplitude: Option<f64>,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> f64 {
        let cfg = self.config;
        let dissipated = cfg.supply_voltage_v * supply_current_a - input.rf_power_dbm;

        let mut temperature = previous_c
            + cfg.heating_gain * dissipated
            - cfg.relaxation_rate * (previous_c - input.ambient_c)
            + noise.draw(NoiseTerm::Temperature, rng);

        if let Some(amplitude) = runaway_amplitude {
            temperature += self.thermal_gain_c * amplitude;
        }

        temperature
    }

    pub fn compression(&self, rf_power_dbm: f64, pa_temperature_c: f64, aging_factor: f64) -> f64 {
        let cfg = self.config;
        let raw = (rf_power_dbm - cfg.linear_end_dbm)
            + cfg.k_temp_compression * (pa_temperature_c - cfg.t_ref_c).max(0.0)
            + cfg.k_aging_compression * aging_factor;

        let compression = raw.max(0.0);
        match cfg.max_compression_db {
            Some(cap) => compression.min(cap),
            None => compression,
        }
    }

    /// Internal error carries the persistent drift walk; external error does not.
    pub fn frequency_errors<R: Rng + ?Sized>(
        &self,
        pa_temperature_c: f64,
        drift_hz: &mut f64,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> (f64, f64) {
        let cfg = self.config;
        let excess = pa_temperature_c - cfg.t_ref_c;

        *drift_hz += noise.draw(NoiseTerm::Drift, rng);
        let internal = cfg.k_temp_freq_hz * excess + *drift_hz + noise.draw(NoiseTerm::FreqInternal, rng);
        let external = cfg.k_ext_temp_freq_hz * excess + noise.draw(NoiseTerm::FreqExternal, rng);

        (internal, external)
    }

    /// Runs the full recurrence and writes temperature and drift back into `state`.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        state: &mut TrajectoryState,
        input: &ExogenousSample,
        noise: &NoiseBank,
        rng: &mut R,
    ) -> PhysicsSample {
        let supply_current_a = self.supply_current(input, state.aging_factor, noise, rng);

        let runaway = state.terminal_fault().then_some(state.latch.amplitude);
        state.pa_temperature_c = self.temperature(
            state.pa_temperature_c,
            input,
            supply_current_a,
            runaway,
            noise,
            rng,
        );

        let compression_db =
            self.compression(input.rf_power_dbm, state.pa_temperature_c, state.aging_factor);
        let measured_rf_output_dbm =
            input.rf_power_dbm - compression_db + noise.draw(NoiseTerm::RfOutput, rng);

        let (freq_error_internal_hz, freq_error_external_hz) =
            self.frequency_errors(state.pa_temperature_c, &mut state.freq_drift_hz, noise, rng);

        PhysicsSample {
            supply_current_a,
            pa_temperature_c: state.pa_temperature_c,
            compression_db,
            measured_rf_output_dbm,
            freq_error_internal_hz,
            freq_error_external_hz,
        }
    }
}
