use crate::config::SimulationConfig;
use crate::degradation::DegradationState;
use crate::ftc::FaultLatch;
use crate::mode::FailureMode;

/// Mutable per-trajectory state, owned by a single trajectory run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryState {
    pub mode: FailureMode,
    pub step: usize,
    pub time_s: f64,
    pub aging_factor: f64,
    pub pa_temperature_c: f64,
    /// Persistent random-walk component of the internal frequency error
    pub freq_drift_hz: f64,
    pub prev_aclr_db: f64,
    pub prev_evm_percent: f64,
    pub latch: FaultLatch,
    pub degradation: DegradationState,
}

impl TrajectoryState {
    /// Fresh state at the start of a trajectory. The degradation rate
    /// multipliers are drawn by the caller.
    pub fn new(
        config: &SimulationConfig,
        mode: FailureMode,
        degradation: DegradationState,
    ) -> Self {
        Self {
            mode,
            step: 0,
            time_s: 0.0,
            aging_factor: 0.0,
            pa_temperature_c: config.physics.t_ref_c,
            freq_drift_hz: 0.0,
            prev_aclr_db: config.quality.initial_aclr_db,
            prev_evm_percent: config.quality.initial_evm_percent,
            latch: FaultLatch::new(),
            degradation,
        }
    }

    /// Terminal-mode trajectory whose latch has tripped.
    pub fn terminal_fault(&self) -> bool {
        self.mode.is_terminal() && self.latch.active
    }

    /// Advance the clock and the wear model by one step.
    pub fn tick(&mut self, config: &SimulationConfig) {
        self.step += 1;
        self.time_s += config.dt;
        self.aging_factor += config.physics.aging_rate_per_s * config.dt;
    }
}
