//! One trajectory's step loop.
//!
//! Each step runs the stages in data-dependency order: clock, exogenous
//! inputs, physics, fault latch, degradation, quality. Every stage reads the
//! state the previous stage just wrote, so the order is fixed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::degradation::DegradationState;
use crate::exogenous::ExogenousDriver;
use crate::ftc::LatchParams;
use crate::mode::FailureMode;
use crate::noise::NoiseBank;
use crate::physics::{PhysicsModel, PhysicsSample};
use crate::quality::{QualityModel, QualitySample};
use crate::state::TrajectoryState;
use crate::telemetry::{elapsed_timestamp, TelemetryRow};
use crate::SynthError;

const STREAM_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed for trajectory `id`'s private stream.
pub fn trajectory_seed(seed: u64, id: usize) -> u64 {
    seed ^ STREAM_SPACING.wrapping_mul(id as u64 + 1)
}

/// Rows of one finished trajectory.
#[derive(Debug, Clone)]
pub struct TrajectoryRun<'a> {
    pub trajectory_id: usize,
    pub mode: FailureMode,
    pub rows: Vec<TelemetryRow<'a>>,
    /// Step index (1-based) at which the fault latch tripped
    pub latched_at: Option<usize>,
    pub final_state: TrajectoryState,
}

/// Steps a single trajectory, one telemetry row per call.
pub struct TrajectoryRunner<'a> {
    config: &'a SimulationConfig,
    trajectory_id: usize,
    exogenous: ExogenousDriver<'a>,
    physics: PhysicsModel<'a>,
    quality: QualityModel<'a>,
    noise: NoiseBank,
    latch_params: LatchParams,
    state: TrajectoryState,
    rng: ChaCha8Rng,
    latched_at: Option<usize>,
}

impl<'a> TrajectoryRunner<'a> {
    pub fn new(
        config: &'a SimulationConfig,
        trajectory_id: usize,
        mode: FailureMode,
    ) -> Result<Self, SynthError> {
        let rng = ChaCha8Rng::seed_from_u64(trajectory_seed(config.random_seed, trajectory_id));
        Self::with_rng(config, trajectory_id, mode, rng)
    }

    pub fn with_rng(
        config: &'a SimulationConfig,
        trajectory_id: usize,
        mode: FailureMode,
        mut rng: ChaCha8Rng,
    ) -> Result<Self, SynthError> {
        let latch_params = LatchParams::for_mode(&config.ftc, mode)?;
        let degradation = DegradationState::for_trajectory(&config.degradation, mode, &mut rng);

        Ok(Self {
            config,
            trajectory_id,
            exogenous: ExogenousDriver::new(config)?,
            physics: PhysicsModel::new(config),
            quality: QualityModel::new(config),
            noise: NoiseBank::new(&config.noise)?,
            latch_params,
            state: TrajectoryState::new(config, mode, degradation),
            rng,
            latched_at: None,
        })
    }

    pub fn state(&self) -> &TrajectoryState {
        &self.state
    }

    pub fn latch_params(&self) -> &LatchParams {
        &self.latch_params
    }

    pub fn latched_at(&self) -> Option<usize> {
        self.latched_at
    }

    pub fn step(&mut self) -> Result<TelemetryRow<'a>, SynthError> {
        let config = self.config;
        self.state.tick(config);

        let input = self.exogenous.sample(self.state.time_s, &mut self.rng);
        let physics = self
            .physics
            .advance(&mut self.state, &input, &self.noise, &mut self.rng);

        let tripped = self.state.latch.observe(
            &self.latch_params,
            input.rf_power_dbm,
            self.state.pa_temperature_c,
        );
        if tripped {
            self.latched_at = Some(self.state.step);
            debug!(
                trajectory_id = self.trajectory_id,
                mode = %self.state.mode,
                step = self.state.step,
                timer = self.state.latch.timer,
                "fault latch tripped"
            );
        }

        if self.state.terminal_fault() {
            self.state
                .degradation
                .accumulate(&config.degradation, self.state.latch.amplitude, &mut self.rng);
        }

        let quality = self
            .quality
            .advance(&mut self.state, input.rf_power_dbm, &self.noise, &mut self.rng);

        self.check_finite(&physics, &quality)?;

        let ts = elapsed_timestamp(config.start_timestamp, self.state.time_s).ok_or_else(|| {
            SynthError::InvalidConfig(format!(
                "elapsed time {} s at step {} is past the timestamp range",
                self.state.time_s, self.state.step
            ))
        })?;

        Ok(TelemetryRow {
            ts,
            rf_frequency_setpoint_hz: input.rf_frequency_hz,
            trajectory_id: self.trajectory_id,
            failure_mode: self.state.mode,
            rf_power_setpoint_dbm: input.rf_power_dbm,
            rf_output_state: input.rf_on,
            pa_supply_current_a: physics.supply_current_a,
            pa_temperature_c: physics.pa_temperature_c,
            measured_rf_output_dbm: physics.measured_rf_output_dbm,
            freq_error_internal_hz: physics.freq_error_internal_hz,
            freq_error_external_hz: physics.freq_error_external_hz,
            aclr_db: quality.aclr_db,
            rms_evm_percent: quality.evm_percent,
            aging_factor: self.state.aging_factor,
            ftc_active: self.state.latch.active,
            data_source: &config.data_source,
        })
    }

    fn check_finite(&self, physics: &PhysicsSample, quality: &QualitySample) -> Result<(), SynthError> {
        let degradation = &self.state.degradation;
        let values = [
            ("pa_supply_current_a", physics.supply_current_a),
            ("pa_temperature_c", physics.pa_temperature_c),
            ("measured_rf_output_dbm", physics.measured_rf_output_dbm),
            ("freq_error_internal_hz", physics.freq_error_internal_hz),
            ("freq_error_external_hz", physics.freq_error_external_hz),
            ("aclr_db", quality.aclr_db),
            ("rms_evm_percent", quality.evm_percent),
            ("aging_factor", self.state.aging_factor),
            ("aclr_bias_db", degradation.aclr_bias_db),
            ("evm_bias_percent", degradation.evm_bias_percent),
        ];

        match values.iter().find(|(_, value)| !value.is_finite()) {
            Some(&(quantity, value)) => Err(SynthError::NumericAnomaly {
                trajectory_id: self.trajectory_id,
                step: self.state.step,
                quantity,
                value,
            }),
            None => Ok(()),
        }
    }

    /// Runs the remaining steps and returns every row.
    pub fn run(mut self) -> Result<TrajectoryRun<'a>, SynthError> {
        let remaining = self.config.steps.saturating_sub(self.state.step);
        let mut rows = Vec::with_capacity(remaining);
        for _ in 0..remaining {
            rows.push(self.step()?);
        }

        Ok(TrajectoryRun {
            trajectory_id: self.trajectory_id,
            mode: self.state.mode,
            rows,
            latched_at: self.latched_at,
            final_state: self.state,
        })
    }
}

pub fn run_trajectory(
    config: &SimulationConfig,
    trajectory_id: usize,
    mode: FailureMode,
) -> Result<TrajectoryRun<'_>, SynthError> {
    debug!(trajectory_id, %mode, steps = config.steps, "trajectory start");
    let run = TrajectoryRunner::new(config, trajectory_id, mode)?.run()?;
    debug!(
        trajectory_id,
        %mode,
        latched_at = ?run.latched_at,
        "trajectory done"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PowerSegment;
    use chrono::Duration;

    fn short(steps: usize) -> SimulationConfig {
        SimulationConfig {
            steps,
            trajectories: 1,
            quotas: Default::default(),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn trajectory_emits_one_row_per_step() {
        let config = short(250);
        let run = run_trajectory(&config, 3, FailureMode::Incipient).unwrap();

        assert_eq!(run.rows.len(), 250);
        assert!(run.rows.iter().all(|row| row.trajectory_id == 3));
        assert!(run.rows.iter().all(|row| row.failure_mode == FailureMode::Incipient));
        assert_eq!(run.final_state.step, 250);
    }

    #[test]
    fn timestamps_advance_by_dt_from_start() {
        let config = short(5);
        let run = run_trajectory(&config, 0, FailureMode::Normal).unwrap();

        for (i, row) in run.rows.iter().enumerate() {
            let expected = config.start_timestamp + Duration::seconds(i as i64 + 1);
            assert_eq!(row.ts, expected);
        }
    }

    #[test]
    fn distinct_trajectories_use_distinct_streams() {
        let config = short(20);
        let a = run_trajectory(&config, 0, FailureMode::Normal).unwrap();
        let b = run_trajectory(&config, 1, FailureMode::Normal).unwrap();
        assert_ne!(a.rows[0].pa_temperature_c, b.rows[0].pa_temperature_c);

        let again = run_trajectory(&config, 0, FailureMode::Normal).unwrap();
        assert_eq!(a.rows, again.rows);
    }

    #[test]
    fn runner_exposes_state_between_steps() {
        let config = short(10);
        let mut runner = TrajectoryRunner::new(&config, 0, FailureMode::Terminal).unwrap();
        runner.step().unwrap();
        assert_eq!(runner.state().step, 1);
        assert_eq!(runner.state().latch.amplitude, 1.0);
        assert_eq!(runner.latch_params().threshold, Some(1200));
    }

    #[test]
    fn sub_millisecond_steps_get_distinct_timestamps() {
        let config = SimulationConfig {
            dt: 1.0e-4,
            ..short(20)
        };
        let run = run_trajectory(&config, 0, FailureMode::Normal).unwrap();

        for pair in run.rows.windows(2) {
            assert!(pair[1].ts > pair[0].ts);
        }
        assert_eq!(run.rows[19].ts - config.start_timestamp, Duration::milliseconds(2));
    }

    #[test]
    fn elapsed_time_past_timestamp_range_is_an_error() {
        let config = SimulationConfig {
            dt: 1.0e13,
            ..short(1)
        };

        let mut runner = TrajectoryRunner::new(&config, 0, FailureMode::Normal).unwrap();
        assert!(matches!(runner.step(), Err(SynthError::InvalidConfig(_))));
        assert!(matches!(
            crate::dataset::generate_dataset(&config),
            Err(SynthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn runaway_heating_surfaces_as_numeric_anomaly() {
        let mut config = short(5000);
        config.physics.heating_gain = 1.0e306;
        config.exogenous.power_schedule = vec![PowerSegment {
            until_s: 1.0e9,
            power_dbm: 10.0,
        }];

        let err = run_trajectory(&config, 0, FailureMode::Normal).unwrap_err();
        match err {
            SynthError::NumericAnomaly { trajectory_id, quantity, value, .. } => {
                assert_eq!(trajectory_id, 0);
                assert!(!value.is_finite());
                assert!(!quantity.is_empty());
            }
            other => panic!("expected NumericAnomaly, got {other:?}"),
        }
    }
}
