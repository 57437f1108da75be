//! CSV export of per-day results and JSON export of the full report.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::analysis::{AnalysisReport, ScenarioResult};

/// Column header for the per-day CSV export.
const HEADER: &str = "scenario,date,total_solar_kwh,starting_soc_kwh,ending_soc_kwh,\
                      min_soc_kwh,max_soc_kwh,filled_pct,charge_kwh,discharge_kwh,time_to_full";

/// Exports every scenario's daily results to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_daily_csv(scenarios: &[ScenarioResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_daily_csv(scenarios, io::BufWriter::new(file))
}

/// Writes one row per scenario and day. Days that never reached full have
/// an empty `time_to_full`.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_daily_csv(scenarios: &[ScenarioResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for scenario in scenarios {
        for d in &scenario.daily_results {
            wtr.write_record(&[
                scenario.label.clone(),
                d.date.to_string(),
                format!("{:.4}", d.total_solar_kwh),
                format!("{:.4}", d.starting_soc_kwh),
                format!("{:.4}", d.ending_soc_kwh),
                format!("{:.4}", d.min_soc_kwh),
                format!("{:.4}", d.max_soc_kwh),
                format!("{:.2}", d.filled_pct),
                format!("{:.4}", d.charge_kwh),
                format!("{:.4}", d.discharge_kwh),
                d.time_to_full
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the report as pretty-printed JSON to a file.
///
/// # Errors
///
/// Returns an `io::Error` if file creation, serialization or writing fails.
pub fn export_json(report: &AnalysisReport, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_json(report, io::BufWriter::new(file))
}

/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_json(report: &AnalysisReport, mut writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::sim::{DailyResult, Policy, SummaryStats};

    fn scenario(full: bool) -> ScenarioResult {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let daily = vec![DailyResult {
            date,
            total_solar_kwh: 30.0,
            starting_soc_kwh: 0.0,
            ending_soc_kwh: 9.8,
            min_soc_kwh: 0.0,
            max_soc_kwh: 9.8,
            filled_pct: 98.0,
            charge_kwh: 9.8,
            discharge_kwh: 0.0,
            time_to_full: full.then(|| date.and_hms_opt(10, 15, 0).unwrap()),
            hourly_soc: BTreeMap::new(),
        }];
        ScenarioResult {
            policy: Policy::scenario_percent(0.0),
            label: "scenario_0%".to_string(),
            summary: SummaryStats::from_daily(&daily),
            daily_results: daily,
        }
    }

    fn csv_lines(scenarios: &[ScenarioResult]) -> Vec<String> {
        let mut buf = Vec::new();
        write_daily_csv(scenarios, &mut buf).unwrap();
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_and_row_count() {
        let lines = csv_lines(&[scenario(true), scenario(false)]);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("scenario,date,total_solar_kwh"));
        assert!(lines[0].ends_with("time_to_full"));
    }

    #[test]
    fn time_to_full_formatting() {
        let lines = csv_lines(&[scenario(true), scenario(false)]);
        assert!(lines[1].ends_with(",10:15"));
        assert!(lines[2].ends_with(','));
        assert!(lines[1].starts_with("scenario_0%,2025-01-15,30.0000"));
    }

    #[test]
    fn deterministic_output() {
        let s = [scenario(true)];
        assert_eq!(csv_lines(&s), csv_lines(&s));
    }
}
