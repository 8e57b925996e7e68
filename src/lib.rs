//! Synthetic RF power-amplifier telemetry with fault-tolerant-control latching.
//!
//! Each trajectory is one simulated amplifier labelled with a failure mode.
//! A trajectory steps a coupled electrical/thermal/RF recurrence, watches a
//! stress timer that can irreversibly latch a fault, and, for terminal units,
//! accumulates degradation that drags ACLR and EVM away from their healthy
//! values. Trajectories are independent and run on the rayon pool, each with
//! its own seed-derived ChaCha stream, so output is reproducible.

pub mod assignment;
pub mod config;
pub mod dataset;
pub mod degradation;
pub mod exogenous;
pub mod ftc;
pub mod logging;
pub mod mode;
pub mod noise;
pub mod output;
pub mod physics;
pub mod quality;
pub mod state;
pub mod telemetry;
pub mod trajectory;

use thiserror::Error;

pub use assignment::TrajectoryAssignment;
pub use config::SimulationConfig;
pub use dataset::{generate_dataset, summarize, Dataset, DatasetSummary};
pub use ftc::{FaultLatch, LatchPhase};
pub use mode::FailureMode;
pub use output::{create_timestamped_output_dir, write_summary_json, write_telemetry_csv};
pub use state::TrajectoryState;
pub use telemetry::TelemetryRow;
pub use trajectory::{run_trajectory, TrajectoryRun, TrajectoryRunner};

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{table} has no entry for failure mode `{mode}`")]
    UnmappedMode {
        table: &'static str,
        mode: FailureMode,
    },
    #[error("trajectory {trajectory_id} step {step}: {quantity} became non-finite ({value})")]
    NumericAnomaly {
        trajectory_id: usize,
        step: usize,
        quantity: &'static str,
        value: f64,
    },
    #[error("random source: {0}")]
    RandomSource(String),
}
