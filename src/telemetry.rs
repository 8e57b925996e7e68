use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::mode::FailureMode;

/// One emitted telemetry sample. Field names are the CSV column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRow<'a> {
    pub ts: DateTime<Utc>,
    pub rf_frequency_setpoint_hz: f64,
    pub trajectory_id: usize,
    pub failure_mode: FailureMode,
    pub rf_power_setpoint_dbm: f64,
    pub rf_output_state: bool,
    pub pa_supply_current_a: f64,
    pub pa_temperature_c: f64,
    pub measured_rf_output_dbm: f64,
    pub freq_error_internal_hz: f64,
    pub freq_error_external_hz: f64,
    pub aclr_db: f64,
    pub rms_evm_percent: f64,
    pub aging_factor: f64,
    pub ftc_active: bool,
    pub data_source: &'a str,
}

/// `start + elapsed_s` at nanosecond resolution. `None` when the result
/// falls outside chrono's representable range.
pub fn elapsed_timestamp(start: DateTime<Utc>, elapsed_s: f64) -> Option<DateTime<Utc>> {
    if !(elapsed_s.is_finite() && elapsed_s >= 0.0) {
        return None;
    }

    let whole = elapsed_s.trunc();
    if whole >= i64::MAX as f64 {
        return None;
    }
    let nanos = ((elapsed_s - whole) * 1.0e9).round() as i64;
    let delta = Duration::try_seconds(whole as i64)?.checked_add(&Duration::nanoseconds(nanos))?;
    start.checked_add_signed(delta)
}
