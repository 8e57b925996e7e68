//! Exogenous inputs: ambient temperature, RF setpoints and the duty cycle.
//!
//! Everything here is a function of elapsed time. Only the ambient
//! temperature consumes randomness, so repeated calls with the same `t`
//! return different ambient draws.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::{ExogenousConfig, SimulationConfig};
use crate::SynthError;

/// Inputs for one step, evaluated at the post-increment elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExogenousSample {
    pub time_s: f64,
    pub ambient_c: f64,
    pub rf_power_dbm: f64,
    pub rf_frequency_hz: f64,
    pub rf_on: bool,
}

#[derive(Debug, Clone)]
pub struct ExogenousDriver<'a> {
    config: &'a ExogenousConfig,
    rf_frequency_hz: f64,
    ambient_noise: Normal<f64>,
}

impl<'a> ExogenousDriver<'a> {
    pub fn new(config: &'a SimulationConfig) -> Result<Self, SynthError> {
        let ambient_noise = Normal::new(0.0, config.exogenous.ambient_noise_c)
            .map_err(|err| SynthError::RandomSource(format!("ambient noise: {err}")))?;
        Ok(Self {
            config: &config.exogenous,
            rf_frequency_hz: config.rf_frequency_hz,
            ambient_noise,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, time_s: f64, rng: &mut R) -> ExogenousSample {
        ExogenousSample {
            time_s,
            ambient_c: self.ambient_temperature(time_s, rng),
            rf_power_dbm: self.rf_power_schedule(time_s),
            rf_frequency_hz: self.rf_frequency_schedule(time_s),
            rf_on: self.rf_output_state(time_s),
        }
    }

    pub fn ambient_temperature<R: Rng + ?Sized>(&self, time_s: f64, rng: &mut R) -> f64 {
        let cfg = self.config;
        cfg.ambient_base_c
            + cfg.ambient_swing_c * (time_s / cfg.ambient_time_scale_s).sin()
            + self.ambient_noise.sample(rng)
    }

    /// Piecewise-constant setpoint: the first segment with `t < until_s` wins.
    pub fn rf_power_schedule(&self, time_s: f64) -> f64 {
        self.config
            .power_schedule
            .iter()
            .find(|segment| time_s < segment.until_s)
            .map(|segment| segment.power_dbm)
            .unwrap_or(self.config.final_power_dbm)
    }

    pub fn rf_frequency_schedule(&self, _time_s: f64) -> f64 {
        self.rf_frequency_hz
    }

    pub fn rf_output_state(&self, time_s: f64) -> bool {
        time_s.rem_euclid(self.config.duty_period_s) < self.config.duty_on_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn power_schedule_steps_through_day_segments() {
        let config = SimulationConfig::default();
        let driver = ExogenousDriver::new(&config).unwrap();

        assert_eq!(driver.rf_power_schedule(1.0), 6.0);
        assert_eq!(driver.rf_power_schedule(8.0 * 3600.0 - 1.0), 6.0);
        assert_eq!(driver.rf_power_schedule(8.0 * 3600.0), 10.0);
        assert_eq!(driver.rf_power_schedule(20.0 * 3600.0), 8.0);
        assert_eq!(driver.rf_power_schedule(36.0 * 3600.0), 8.0);
    }

    #[test]
    fn duty_cycle_is_on_for_configured_fraction() {
        let config = SimulationConfig::default();
        let driver = ExogenousDriver::new(&config).unwrap();

        let on = (1..=1800)
            .filter(|&t| driver.rf_output_state(t as f64))
            .count();
        assert_eq!(on, 1500);
        assert!(driver.rf_output_state(1499.0));
        assert!(!driver.rf_output_state(1500.0));
        assert!(!driver.rf_output_state(1799.0));
        assert!(driver.rf_output_state(1800.0));
    }

    #[test]
    fn single_trajectory_preset_uses_bench_schedule() {
        let config = SimulationConfig::single_trajectory();
        let driver = ExogenousDriver::new(&config).unwrap();

        assert_eq!(driver.rf_power_schedule(1799.0), 5.0);
        assert_eq!(driver.rf_power_schedule(1800.0), 10.0);
        assert!(driver.rf_output_state(999.0));
        assert!(!driver.rf_output_state(1000.0));
    }

    #[test]
    fn noiseless_ambient_follows_sinusoid() {
        let mut config = SimulationConfig::default();
        config.exogenous.ambient_noise_c = 0.0;
        let driver = ExogenousDriver::new(&config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let t = 7200.0 * std::f64::consts::FRAC_PI_2;
        approx::assert_abs_diff_eq!(driver.ambient_temperature(t, &mut rng), 28.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(driver.ambient_temperature(0.0, &mut rng), 25.0, epsilon = 1e-12);
    }
}
