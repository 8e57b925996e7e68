use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;

use crate::dataset::DatasetSummary;
use crate::telemetry::TelemetryRow;
use crate::SynthError;

pub const OUTPUT_ROOT: &str = "output-pa-ftc-synth";
pub const TELEMETRY_FILE: &str = "telemetry.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Creates `<root>/output-pa-ftc-synth/<UTC timestamp>`, suffixing a
/// counter when the directory already exists.
pub fn create_timestamped_output_dir(root: &Path) -> Result<PathBuf, SynthError> {
    let output_root = root.join(OUTPUT_ROOT);
    fs::create_dir_all(&output_root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = output_root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = output_root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

/// Writes a header row followed by one record per row.
pub fn write_telemetry<'r, 'a: 'r, W, I>(writer: W, rows: I) -> Result<(), SynthError>
where
    W: io::Write,
    I: IntoIterator<Item = &'r TelemetryRow<'a>>,
{
    let mut writer = Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_telemetry_csv<'r, 'a: 'r, I>(path: &Path, rows: I) -> Result<(), SynthError>
where
    I: IntoIterator<Item = &'r TelemetryRow<'a>>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = io::BufWriter::new(fs::File::create(path)?);
    write_telemetry(file, rows)
}

pub fn write_summary_json(path: &Path, summary: &DatasetSummary) -> Result<(), SynthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::FailureMode;
    use chrono::TimeZone;

    fn row(data_source: &str) -> TelemetryRow<'_> {
        TelemetryRow {
            ts: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap(),
            rf_frequency_setpoint_hz: 3.0e9,
            trajectory_id: 7,
            failure_mode: FailureMode::Terminal,
            rf_power_setpoint_dbm: 6.0,
            rf_output_state: true,
            pa_supply_current_a: 1.4,
            pa_temperature_c: 25.5,
            measured_rf_output_dbm: 5.9,
            freq_error_internal_hz: 0.25,
            freq_error_external_hz: -0.5,
            aclr_db: 44.75,
            rms_evm_percent: 1.0,
            aging_factor: 1.0e-7,
            ftc_active: false,
            data_source,
        }
    }

    #[test]
    fn csv_header_uses_column_names() {
        let rows = [row("synthetic_physics")];
        let mut buf = Vec::new();
        write_telemetry(&mut buf, rows.iter()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ts,rf_frequency_setpoint_hz,trajectory_id,failure_mode,rf_power_setpoint_dbm,\
             rf_output_state,pa_supply_current_a,pa_temperature_c,measured_rf_output_dbm,\
             freq_error_internal_hz,freq_error_external_hz,aclr_db,rms_evm_percent,\
             aging_factor,ftc_active,data_source"
        );
        let record = lines.next().unwrap();
        assert!(record.starts_with("2025-01-01T00:00:01Z,"));
        assert!(record.contains(",7,terminal,"));
        assert!(record.ends_with(",false,synthetic_physics"));
    }

    #[test]
    fn timestamped_dirs_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = create_timestamped_output_dir(root.path()).unwrap();
        let second = create_timestamped_output_dir(root.path()).unwrap();

        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
        assert!(first.starts_with(root.path().join(OUTPUT_ROOT)));
    }
}
