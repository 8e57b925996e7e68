use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::assignment::TrajectoryAssignment;
use crate::config::SimulationConfig;
use crate::mode::FailureMode;
use crate::telemetry::TelemetryRow;
use crate::trajectory::{run_trajectory, TrajectoryRun};
use crate::SynthError;

/// Every trajectory of one run, in trajectory-id order.
#[derive(Debug, Clone)]
pub struct Dataset<'a> {
    pub assignment: TrajectoryAssignment,
    pub trajectories: Vec<TrajectoryRun<'a>>,
}

impl<'a> Dataset<'a> {
    /// Rows grouped by trajectory, step order preserved within each.
    pub fn rows(&self) -> impl Iterator<Item = &TelemetryRow<'a>> + '_ {
        self.trajectories.iter().flat_map(|run| run.rows.iter())
    }

    pub fn row_count(&self) -> usize {
        self.trajectories.iter().map(|run| run.rows.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModeSummary {
    pub trajectories: usize,
    pub latched: usize,
    pub mean_final_aclr_db: f64,
    pub mean_final_evm_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub seed: u64,
    pub trajectories: usize,
    pub steps: usize,
    pub rows: usize,
    pub data_source: String,
    pub modes: BTreeMap<FailureMode, ModeSummary>,
}

pub fn generate_dataset(config: &SimulationConfig) -> Result<Dataset<'_>, SynthError> {
    let mut shuffle_rng = ChaCha8Rng::seed_from_u64(config.random_seed);
    let assignment = TrajectoryAssignment::build(config, &mut shuffle_rng)?;
    generate_with_assignment(config, assignment)
}

/// Runs a caller-supplied assignment. The config is validated first; the
/// assignment length replaces `config.trajectories`.
pub fn generate_with_assignment(
    config: &SimulationConfig,
    assignment: TrajectoryAssignment,
) -> Result<Dataset<'_>, SynthError> {
    config.validate()?;

    info!(
        trajectories = assignment.len(),
        steps = config.steps,
        seed = config.random_seed,
        parallel = config.parallel,
        "generating telemetry"
    );

    let trajectories: Vec<TrajectoryRun<'_>> = if config.parallel {
        assignment
            .modes()
            .par_iter()
            .enumerate()
            .map(|(id, &mode)| run_trajectory(config, id, mode))
            .collect::<Result<_, _>>()?
    } else {
        assignment
            .modes()
            .iter()
            .enumerate()
            .map(|(id, &mode)| run_trajectory(config, id, mode))
            .collect::<Result<_, _>>()?
    };

    let dataset = Dataset {
        assignment,
        trajectories,
    };
    info!(
        rows = dataset.row_count(),
        latched = dataset
            .trajectories
            .iter()
            .filter(|run| run.latched_at.is_some())
            .count(),
        "telemetry generated"
    );
    Ok(dataset)
}

pub fn summarize(config: &SimulationConfig, dataset: &Dataset<'_>) -> DatasetSummary {
    let mut modes: BTreeMap<FailureMode, ModeSummary> = BTreeMap::new();

    for run in &dataset.trajectories {
        let entry = modes.entry(run.mode).or_default();
        entry.trajectories += 1;
        if run.latched_at.is_some() {
            entry.latched += 1;
        }
        entry.mean_final_aclr_db += run.final_state.prev_aclr_db;
        entry.mean_final_evm_percent += run.final_state.prev_evm_percent;
    }

    for entry in modes.values_mut() {
        let n = entry.trajectories as f64;
        entry.mean_final_aclr_db /= n;
        entry.mean_final_evm_percent /= n;
    }

    DatasetSummary {
        seed: config.random_seed,
        trajectories: dataset.trajectories.len(),
        steps: config.steps,
        rows: dataset.row_count(),
        data_source: config.data_source.clone(),
        modes,
    }
}
