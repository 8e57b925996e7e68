use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use pa_ftc_synth::logging::init_tracing;
use pa_ftc_synth::output::{SUMMARY_FILE, TELEMETRY_FILE};
use pa_ftc_synth::{
    create_timestamped_output_dir, generate_dataset, summarize, write_summary_json,
    write_telemetry_csv, SimulationConfig, SynthError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// 68 trajectories over 36 h with failure-mode quotas
    FaultInjection,
    /// One healthy unit over 1 h with capped compression
    SingleTrajectory,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Synthetic RF power-amplifier telemetry with FTC fault latching")]
struct Cli {
    /// JSON config file; `config.json` in the working directory is used when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory under which `output-pa-ftc-synth/<timestamp>` is created
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Built-in configuration used when no config file is found
    #[arg(long, value_enum, default_value_t = Preset::FaultInjection)]
    preset: Preset,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Run trajectories on the calling thread only
    #[arg(long)]
    sequential: bool,
}

fn main() {
    if let Err(error) = try_main() {
        eprintln!("pa-ftc-synth failed: {error}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), SynthError> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = load_config(cli.config.as_deref(), cli.preset)?;
    if let Some(seed) = cli.seed {
        config.random_seed = seed;
    }
    if cli.sequential {
        config.parallel = false;
    }
    config.validate()?;

    let dataset = generate_dataset(&config)?;
    let summary = summarize(&config, &dataset);

    let output_dir = create_timestamped_output_dir(&cli.output)?;
    let csv_path = output_dir.join(TELEMETRY_FILE);
    let summary_path = output_dir.join(SUMMARY_FILE);
    write_telemetry_csv(&csv_path, dataset.rows())?;
    write_summary_json(&summary_path, &summary)?;

    println!("Rows: {}", summary.rows);
    for (mode, stats) in &summary.modes {
        println!(
            "{mode:<10} trajectories {:>3} | latched {:>3}",
            stats.trajectories, stats.latched
        );
    }
    println!("CSV: {}", csv_path.display());
    println!("Summary: {}", summary_path.display());
    Ok(())
}

fn load_config(path: Option<&Path>, preset: Preset) -> Result<SimulationConfig, SynthError> {
    if let Some(path) = path {
        return SimulationConfig::from_json_file(path);
    }

    let cwd_config = PathBuf::from("config.json");
    if cwd_config.exists() {
        return SimulationConfig::from_json_file(&cwd_config);
    }

    Ok(match preset {
        Preset::FaultInjection => SimulationConfig::default(),
        Preset::SingleTrajectory => SimulationConfig::single_trajectory(),
    })
}
