//! Battery ROI entry point: CLI wiring, logging, and report output.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use battery_roi::analysis::analyze;
use battery_roi::cli::{AnalyzeArgs, Args, Command, FinanceArgs};
use battery_roi::finance;
use battery_roi::io::export::{export_daily_csv, export_json};
use battery_roi::io::readings::load_files;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();

    match Args::parse().command {
        Command::Analyze(args) => run_analyze(&args),
        Command::Finance(args) => run_finance(&args),
    }
}

fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<()> {
    let config = args.config.load()?;
    let days = load_files(&args.readings).context("failed to load readings")?;
    let report = analyze(&config, &days)?;

    println!("{report}");

    if let Some(path) = &args.json_out {
        export_json(&report, path).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    if let Some(path) = &args.daily_csv {
        export_daily_csv(&report.scenarios, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "daily results written");
    }
    Ok(())
}

fn run_finance(args: &FinanceArgs) -> anyhow::Result<()> {
    let config = args.config.load()?;
    let principal = args
        .principal
        .unwrap_or_else(|| config.investment.net_investment());
    let comparison = finance::compare(
        principal,
        &config.finance.lenders,
        config.finance.mortgage_rate_pct,
        config.finance.compare_offset,
    )?;
    println!("{comparison}");
    Ok(())
}
