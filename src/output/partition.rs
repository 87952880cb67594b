//! Output key layout

use chrono::{DateTime, Utc};

/// Partition value for a run, `YYYY-MM-DD`
pub fn partition_date(run_ts: &DateTime<Utc>) -> String {
    run_ts.format("%Y-%m-%d").to_string()
}

/// Artifact file name for a run, `YYYYMMDDHHMM.json`
pub fn run_file_name(run_ts: &DateTime<Utc>) -> String {
    format!("{}.json", run_ts.format("%Y%m%d%H%M"))
}

/// Build the artifact key for one source and run
///
/// Format: `{output_prefix}/{YYYYMMDDHHMM}.json`, or with Hive-style
/// partitioning `{output_prefix}/dt={YYYY-MM-DD}/{YYYYMMDDHHMM}.json`.
///
/// Examples:
/// - `forecast_data/forecast_fact/202511030700.json`
/// - `forecast_data/forecast_fact/dt=2025-11-03/202511030700.json`
pub fn build_output_key(output_prefix: &str, run_ts: &DateTime<Utc>, hive: bool) -> String {
    let prefix = output_prefix.trim_end_matches('/');
    let file = run_file_name(run_ts);
    match (prefix.is_empty(), hive) {
        (true, false) => file,
        (true, true) => format!("dt={}/{file}", partition_date(run_ts)),
        (false, false) => format!("{prefix}/{file}"),
        (false, true) => format!("{prefix}/dt={}/{file}", partition_date(run_ts)),
    }
}
