use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::mode::{FailureMode, ModeTable};
use crate::telemetry::elapsed_timestamp;
use crate::SynthError;

/// 2025-01-01T00:00:00Z
const DEFAULT_START_EPOCH_S: i64 = 1_735_689_600;

pub const DEFAULT_DATA_SOURCE: &str = "synthetic_physics";

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Step size [s]
    #[serde_as(as = "DefaultOnNull")]
    pub dt: f64,
    /// Steps per trajectory
    #[serde_as(as = "DefaultOnNull")]
    pub steps: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub trajectories: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub random_seed: u64,
    /// RF carrier frequency setpoint [Hz]
    #[serde_as(as = "DefaultOnNull")]
    pub rf_frequency_hz: f64,
    /// Timestamp of step zero; rows are stamped `start + elapsed`.
    pub start_timestamp: DateTime<Utc>,
    /// Provenance tag copied onto every row
    #[serde_as(as = "DefaultOnNull")]
    pub data_source: String,
    /// Run trajectories on the rayon pool
    #[serde_as(as = "DefaultOnNull")]
    pub parallel: bool,
    pub exogenous: ExogenousConfig,
    pub physics: PhysicsConfig,
    pub noise: NoiseConfig,
    pub ftc: FtcConfig,
    pub degradation: DegradationConfig,
    pub quality: QualityConfig,
    /// Minimum trajectory count per mode; the remainder is labelled `normal`.
    pub quotas: ModeTable<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PowerSegment {
    /// Segment applies while `t < until_s`
    pub until_s: f64,
    pub power_dbm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExogenousConfig {
    pub ambient_base_c: f64,
    pub ambient_swing_c: f64,
    /// Ambient drift follows `sin(t / ambient_time_scale_s)`
    pub ambient_time_scale_s: f64,
    pub ambient_noise_c: f64,
    pub power_schedule: Vec<PowerSegment>,
    /// Setpoint after the last segment
    pub final_power_dbm: f64,
    pub duty_period_s: f64,
    /// RF is on while `t mod duty_period_s < duty_on_s`
    pub duty_on_s: f64,
}

impl Default for ExogenousConfig {
    fn default() -> Self {
        Self {
            ambient_base_c: 25.0,
            ambient_swing_c: 3.0,
            ambient_time_scale_s: 7200.0,
            ambient_noise_c: 0.3,
            power_schedule: vec![
                PowerSegment {
                    until_s: 8.0 * 3600.0,
                    power_dbm: 6.0,
                },
                PowerSegment {
                    until_s: 20.0 * 3600.0,
                    power_dbm: 10.0,
                },
            ],
            final_power_dbm: 8.0,
            duty_period_s: 1800.0,
            duty_on_s: 1500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub t_ref_c: f64,
    pub supply_voltage_v: f64,
    pub idle_current_a: f64,
    /// Supply current per dBm of setpoint
    pub k_power_current: f64,
    pub k_aging_current: f64,
    /// Temperature rise per watt dissipated per step
    pub heating_gain: f64,
    /// Fraction of the gap to ambient recovered per step
    pub relaxation_rate: f64,
    pub linear_end_dbm: f64,
    pub k_temp_compression: f64,
    pub k_aging_compression: f64,
    /// Hard cap on compression; `None` leaves it unbounded
    pub max_compression_db: Option<f64>,
    pub k_temp_freq_hz: f64,
    pub k_ext_temp_freq_hz: f64,
    pub aging_rate_per_s: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            t_ref_c: 25.0,
            supply_voltage_v: 28.0,
            idle_current_a: 0.5,
            k_power_current: 0.15,
            k_aging_current: 2.0,
            heating_gain: 0.02,
            relaxation_rate: 0.01,
            linear_end_dbm: 10.0,
            k_temp_compression: 0.02,
            k_aging_compression: 1.5,
            max_compression_db: None,
            k_temp_freq_hz: 1.0,
            k_ext_temp_freq_hz: 0.2,
            aging_rate_per_s: 1.0e-7,
        }
    }
}

/// Gaussian standard deviations, one per noisy term.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub current_a: f64,
    pub temperature_c: f64,
    pub rf_output_dbm: f64,
    pub drift_hz: f64,
    pub freq_internal_hz: f64,
    pub freq_external_hz: f64,
    pub aclr_db: f64,
    pub evm_percent: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            current_a: 0.05,
            temperature_c: 0.1,
            rf_output_dbm: 0.2,
            drift_hz: 0.05,
            freq_internal_hz: 1.0,
            freq_external_hz: 0.5,
            aclr_db: 0.3,
            evm_percent: 0.08,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtcConfig {
    pub stress_power_dbm: f64,
    pub stress_temperature_c: f64,
    /// Stress-timer value at which the latch trips. `normal` has no entry.
    pub timer_thresholds: ModeTable<u32>,
    pub amplitude_caps: ModeTable<f64>,
    pub amplitude_step: f64,
    /// Extra heating per step while latched (terminal only), scaled by amplitude
    pub thermal_gain_c: f64,
}

impl Default for FtcConfig {
    fn default() -> Self {
        Self {
            stress_power_dbm: 9.5,
            stress_temperature_c: 60.0,
            timer_thresholds: ModeTable::from([
                (FailureMode::Terminal, 1200),
                (FailureMode::Incipient, 300),
                (FailureMode::Recovering, 300),
            ]),
            amplitude_caps: ModeTable::from([
                (FailureMode::Normal, 1.0),
                (FailureMode::Incipient, 1.25),
                (FailureMode::Recovering, 1.7),
                (FailureMode::Terminal, 3.0),
            ]),
            amplitude_step: 0.001,
            thermal_gain_c: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UniformRange {
    pub low: f64,
    pub high: f64,
}

impl UniformRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low < self.high
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    pub base_aclr_rate: f64,
    pub base_evm_rate: f64,
    /// Unit-to-unit severity, drawn once per terminal trajectory
    pub aclr_rate_multiplier: UniformRange,
    pub evm_rate_multiplier: UniformRange,
    /// Per-step additive jitter
    pub aclr_jitter: UniformRange,
    pub evm_jitter: UniformRange,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            base_aclr_rate: 2.5e-4,
            base_evm_rate: 1.5e-4,
            aclr_rate_multiplier: UniformRange::new(0.8, 1.4),
            evm_rate_multiplier: UniformRange::new(0.7, 1.5),
            aclr_jitter: UniformRange::new(0.005, 0.015),
            evm_jitter: UniformRange::new(0.01, 0.03),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub initial_aclr_db: f64,
    pub initial_evm_percent: f64,
    pub aclr_ceiling_db: f64,
    pub aclr_power_knee_dbm: f64,
    pub aclr_power_slope: f64,
    pub aclr_temp_knee_c: f64,
    pub aclr_temp_slope: f64,
    pub evm_aclr_reference_db: f64,
    pub evm_aclr_slope: f64,
    pub evm_temp_knee_c: f64,
    pub evm_temp_slope: f64,
    pub evm_aging_slope: f64,
    pub evm_soft_scale: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            initial_aclr_db: 45.0,
            initial_evm_percent: 1.0,
            aclr_ceiling_db: 100.0,
            aclr_power_knee_dbm: 5.0,
            aclr_power_slope: 0.06,
            aclr_temp_knee_c: 40.0,
            aclr_temp_slope: 0.04,
            evm_aclr_reference_db: 45.0,
            evm_aclr_slope: 0.12,
            evm_temp_knee_c: 40.0,
            evm_temp_slope: 0.03,
            evm_aging_slope: 0.4,
            evm_soft_scale: 25.0,
        }
    }
}

fn default_start_timestamp() -> DateTime<Utc> {
    Utc.timestamp_opt(DEFAULT_START_EPOCH_S, 0)
        .single()
        .unwrap_or_default()
}

impl Default for SimulationConfig {
    /// The 36 h fault-injection dataset.
    fn default() -> Self {
        Self {
            dt: 1.0,
            steps: 36 * 3600,
            trajectories: 68,
            random_seed: 42,
            rf_frequency_hz: 3.0e9,
            start_timestamp: default_start_timestamp(),
            data_source: DEFAULT_DATA_SOURCE.to_string(),
            parallel: true,
            exogenous: ExogenousConfig::default(),
            physics: PhysicsConfig::default(),
            noise: NoiseConfig::default(),
            ftc: FtcConfig::default(),
            degradation: DegradationConfig::default(),
            quality: QualityConfig::default(),
            quotas: ModeTable::from([
                (FailureMode::Incipient, 8),
                (FailureMode::Recovering, 8),
                (FailureMode::Terminal, 12),
            ]),
        }
    }
}

impl SimulationConfig {
    /// One-hour bench run of a single healthy unit with capped compression.
    pub fn single_trajectory() -> Self {
        Self {
            steps: 3600,
            trajectories: 1,
            exogenous: ExogenousConfig {
                ambient_swing_c: 2.0,
                ambient_time_scale_s: 3600.0,
                ambient_noise_c: 0.2,
                power_schedule: vec![PowerSegment {
                    until_s: 1800.0,
                    power_dbm: 5.0,
                }],
                final_power_dbm: 10.0,
                duty_period_s: 1200.0,
                duty_on_s: 1000.0,
                ..ExogenousConfig::default()
            },
            physics: PhysicsConfig {
                max_compression_db: Some(6.0),
                ..PhysicsConfig::default()
            },
            quotas: ModeTable::new(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SynthError> {
        let raw = fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn quota_total(&self) -> usize {
        self.quotas.values().sum()
    }

    pub fn duration_s(&self) -> f64 {
        self.dt * self.steps as f64
    }

    pub fn total_rows(&self) -> usize {
        self.trajectories * self.steps
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(invalid("dt must be finite and greater than zero"));
        }
        if self.steps == 0 {
            return Err(invalid("steps must be greater than zero"));
        }
        if self.trajectories == 0 {
            return Err(invalid("trajectories must be greater than zero"));
        }
        if self.quota_total() > self.trajectories {
            return Err(invalid(format!(
                "mode quotas sum to {} but only {} trajectories are configured",
                self.quota_total(),
                self.trajectories
            )));
        }
        if !self.rf_frequency_hz.is_finite() {
            return Err(invalid("rf_frequency_hz must be finite"));
        }
        if elapsed_timestamp(self.start_timestamp, self.duration_s()).is_none() {
            return Err(invalid(format!(
                "dt * steps = {} s runs past the representable timestamp range",
                self.duration_s()
            )));
        }

        self.validate_exogenous()?;
        self.validate_physics()?;
        self.validate_noise()?;
        self.validate_ftc()?;
        self.validate_degradation()?;
        self.validate_quality()?;
        Ok(())
    }

    fn validate_exogenous(&self) -> Result<(), SynthError> {
        let exo = &self.exogenous;
        ensure_finite("exogenous.ambient_base_c", exo.ambient_base_c)?;
        ensure_finite("exogenous.ambient_swing_c", exo.ambient_swing_c)?;
        ensure_finite("exogenous.final_power_dbm", exo.final_power_dbm)?;
        ensure_sigma("exogenous.ambient_noise_c", exo.ambient_noise_c)?;

        if !(exo.ambient_time_scale_s.is_finite() && exo.ambient_time_scale_s > 0.0) {
            return Err(invalid("exogenous.ambient_time_scale_s must be greater than zero"));
        }
        if !(exo.duty_period_s.is_finite() && exo.duty_period_s > 0.0) {
            return Err(invalid("exogenous.duty_period_s must be greater than zero"));
        }
        if !(exo.duty_on_s >= 0.0 && exo.duty_on_s <= exo.duty_period_s) {
            return Err(invalid(
                "exogenous.duty_on_s must lie within [0, duty_period_s]",
            ));
        }

        let mut previous = f64::NEG_INFINITY;
        for segment in &exo.power_schedule {
            ensure_finite("exogenous.power_schedule.power_dbm", segment.power_dbm)?;
            if !(segment.until_s.is_finite() && segment.until_s > previous) {
                return Err(invalid(
                    "exogenous.power_schedule must be strictly increasing in until_s",
                ));
            }
            previous = segment.until_s;
        }

        Ok(())
    }

    fn validate_physics(&self) -> Result<(), SynthError> {
        let p = &self.physics;
        for (name, value) in [
            ("physics.t_ref_c", p.t_ref_c),
            ("physics.supply_voltage_v", p.supply_voltage_v),
            ("physics.idle_current_a", p.idle_current_a),
            ("physics.k_power_current", p.k_power_current),
            ("physics.k_aging_current", p.k_aging_current),
            ("physics.heating_gain", p.heating_gain),
            ("physics.relaxation_rate", p.relaxation_rate),
            ("physics.linear_end_dbm", p.linear_end_dbm),
            ("physics.k_temp_compression", p.k_temp_compression),
            ("physics.k_aging_compression", p.k_aging_compression),
            ("physics.k_temp_freq_hz", p.k_temp_freq_hz),
            ("physics.k_ext_temp_freq_hz", p.k_ext_temp_freq_hz),
        ] {
            ensure_finite(name, value)?;
        }

        if !(p.aging_rate_per_s.is_finite() && p.aging_rate_per_s >= 0.0) {
            return Err(invalid(
                "physics.aging_rate_per_s must be finite and non-negative",
            ));
        }
        if let Some(cap) = p.max_compression_db {
            if !(cap.is_finite() && cap >= 0.0) {
                return Err(invalid(
                    "physics.max_compression_db must be finite and non-negative",
                ));
            }
        }

        Ok(())
    }

    fn validate_noise(&self) -> Result<(), SynthError> {
        let n = &self.noise;
        for (name, sigma) in [
            ("noise.current_a", n.current_a),
            ("noise.temperature_c", n.temperature_c),
            ("noise.rf_output_dbm", n.rf_output_dbm),
            ("noise.drift_hz", n.drift_hz),
            ("noise.freq_internal_hz", n.freq_internal_hz),
            ("noise.freq_external_hz", n.freq_external_hz),
            ("noise.aclr_db", n.aclr_db),
            ("noise.evm_percent", n.evm_percent),
        ] {
            ensure_sigma(name, sigma)?;
        }
        Ok(())
    }

    fn validate_ftc(&self) -> Result<(), SynthError> {
        let ftc = &self.ftc;
        ensure_finite("ftc.stress_power_dbm", ftc.stress_power_dbm)?;
        ensure_finite("ftc.stress_temperature_c", ftc.stress_temperature_c)?;
        ensure_finite("ftc.thermal_gain_c", ftc.thermal_gain_c)?;
        if !(ftc.amplitude_step.is_finite() && ftc.amplitude_step >= 0.0) {
            return Err(invalid("ftc.amplitude_step must be finite and non-negative"));
        }

        for mode in FailureMode::FAULTING {
            if !ftc.timer_thresholds.contains_key(&mode) {
                return Err(SynthError::UnmappedMode {
                    table: "ftc.timer_thresholds",
                    mode,
                });
            }
        }

        for mode in FailureMode::ALL {
            let cap = ftc
                .amplitude_caps
                .get(&mode)
                .copied()
                .ok_or(SynthError::UnmappedMode {
                    table: "ftc.amplitude_caps",
                    mode,
                })?;
            if !(cap.is_finite() && cap >= 1.0) {
                return Err(invalid(format!(
                    "ftc.amplitude_caps.{mode} must be finite and at least 1.0"
                )));
            }
        }

        Ok(())
    }

    fn validate_degradation(&self) -> Result<(), SynthError> {
        let d = &self.degradation;
        for (name, rate) in [
            ("degradation.base_aclr_rate", d.base_aclr_rate),
            ("degradation.base_evm_rate", d.base_evm_rate),
        ] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(invalid(format!("{name} must be finite and non-negative")));
            }
        }

        for (name, range) in [
            ("degradation.aclr_rate_multiplier", d.aclr_rate_multiplier),
            ("degradation.evm_rate_multiplier", d.evm_rate_multiplier),
            ("degradation.aclr_jitter", d.aclr_jitter),
            ("degradation.evm_jitter", d.evm_jitter),
        ] {
            if !range.is_valid() {
                return Err(invalid(format!("{name} must satisfy low < high")));
            }
            if range.low < 0.0 {
                return Err(invalid(format!("{name} must be non-negative")));
            }
        }

        Ok(())
    }

    fn validate_quality(&self) -> Result<(), SynthError> {
        let q = &self.quality;
        for (name, value) in [
            ("quality.initial_aclr_db", q.initial_aclr_db),
            ("quality.initial_evm_percent", q.initial_evm_percent),
            ("quality.aclr_ceiling_db", q.aclr_ceiling_db),
            ("quality.aclr_power_knee_dbm", q.aclr_power_knee_dbm),
            ("quality.aclr_power_slope", q.aclr_power_slope),
            ("quality.aclr_temp_knee_c", q.aclr_temp_knee_c),
            ("quality.aclr_temp_slope", q.aclr_temp_slope),
            ("quality.evm_aclr_reference_db", q.evm_aclr_reference_db),
            ("quality.evm_aclr_slope", q.evm_aclr_slope),
            ("quality.evm_temp_knee_c", q.evm_temp_knee_c),
            ("quality.evm_temp_slope", q.evm_temp_slope),
            ("quality.evm_aging_slope", q.evm_aging_slope),
        ] {
            ensure_finite(name, value)?;
        }

        if q.initial_aclr_db > q.aclr_ceiling_db {
            return Err(invalid(
                "quality.initial_aclr_db must not exceed quality.aclr_ceiling_db",
            ));
        }
        if !(q.evm_soft_scale.is_finite() && q.evm_soft_scale > 0.0) {
            return Err(invalid("quality.evm_soft_scale must be greater than zero"));
        }
        if q.initial_evm_percent < 0.0 {
            return Err(invalid("quality.initial_evm_percent must be non-negative"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SynthError {
    SynthError::InvalidConfig(message.into())
}

fn ensure_finite(name: &str, value: f64) -> Result<(), SynthError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite")))
    }
}

fn ensure_sigma(name: &str, sigma: f64) -> Result<(), SynthError> {
    if sigma.is_finite() && sigma >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "{name} must be a finite, non-negative standard deviation"
        )))
    }
}
