//! Command-line arguments for the analysis and finance subcommands.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AnalysisConfig;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Simulate the battery over recorded readings and report savings.
    #[clap(name = "analyze")]
    Analyze(AnalyzeArgs),

    /// Compare ways to finance the battery.
    #[clap(name = "finance")]
    Finance(FinanceArgs),
}

#[derive(Parser)]
pub struct ConfigArgs {
    /// TOML configuration file.
    #[clap(long, env = "BATTERY_ROI_CONFIG", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in preset (`baseline` or `compact`).
    #[clap(long)]
    pub preset: Option<String>,
}

impl ConfigArgs {
    /// Loads and validates the configuration: `--config` first, then
    /// `--preset`, then the baseline.
    pub fn load(&self) -> anyhow::Result<AnalysisConfig> {
        let config = if let Some(path) = &self.config {
            AnalysisConfig::from_toml_file(path)?
        } else if let Some(name) = &self.preset {
            AnalysisConfig::from_preset(name)?
        } else {
            AnalysisConfig::baseline()
        };

        let errors = config.validate();
        if let Some(first) = errors.first() {
            let all = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
            return Err(first.clone()).context(all);
        }
        Ok(config)
    }
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Readings CSV files (`timestamp,solar_power_w[,consumption_power_w]`
    /// or inverter exports).
    #[clap(long = "readings", required = true, num_args = 1..)]
    pub readings: Vec<PathBuf>,

    #[clap(flatten)]
    pub config: ConfigArgs,

    /// Write the full report as JSON.
    #[clap(long = "json-out")]
    pub json_out: Option<PathBuf>,

    /// Write per-day results of every scenario as CSV.
    #[clap(long = "daily-csv")]
    pub daily_csv: Option<PathBuf>,
}

#[derive(Parser)]
pub struct FinanceArgs {
    #[clap(flatten)]
    pub config: ConfigArgs,

    /// Amount to finance; defaults to the configured net investment.
    #[clap(long)]
    pub principal: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn analyze_args() {
        let args = Args::try_parse_from([
            "battery-roi",
            "analyze",
            "--readings",
            "a.csv",
            "b.csv",
            "--preset",
            "compact",
            "--json-out",
            "report.json",
        ])
        .unwrap();
        let Command::Analyze(args) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.readings.len(), 2);
        assert_eq!(args.config.preset.as_deref(), Some("compact"));
        assert!(args.daily_csv.is_none());
    }

    #[test]
    fn config_and_preset_conflict() {
        let result = Args::try_parse_from([
            "battery-roi",
            "finance",
            "--config",
            "x.toml",
            "--preset",
            "baseline",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn default_config_is_valid_baseline() {
        let args = ConfigArgs {
            config: None,
            preset: None,
        };
        let config = args.load().unwrap();
        assert_eq!(config.battery.capacity_kwh, 28.8);
    }
}
