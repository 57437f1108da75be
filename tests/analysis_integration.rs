//! End-to-end tests: CSV readings through the analysis to the exported report.

mod common;

use std::fmt::Write as _;

use battery_roi::analysis::analyze;
use battery_roi::config::{AnalysisConfig, PromotionConfig};
use battery_roi::cost::{BillingMonth, YearMonth};
use battery_roi::io::export::{write_daily_csv, write_json};
use battery_roi::io::readings::load_reader;
use battery_roi::reading::DayBatch;

/// Renders day batches in the canonical CSV layout.
fn to_csv(days: &[DayBatch]) -> String {
    let mut out = String::from("timestamp,solar_power_w,consumption_power_w\n");
    for r in days.iter().flat_map(|d| &d.readings) {
        writeln!(
            out,
            "{},{:.3},{:.3}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.solar_power_w,
            r.consumption_power_w
        )
        .unwrap();
    }
    out
}

fn july_days() -> Vec<DayBatch> {
    let csv = to_csv(&common::household_days(common::date(2025, 7, 1), 5, 5500.0));
    load_reader(csv.as_bytes()).unwrap()
}

fn july_bill() -> BillingMonth {
    BillingMonth {
        sponge: 28.75,
        peak: 657.57,
        off_peak: 269.27,
        feed_in: 218.55,
    }
}

#[test]
fn analysis_runs_every_policy() {
    let config = AnalysisConfig::baseline();
    let days = july_days();

    let report = analyze(&config, &days).unwrap();

    assert_eq!(report.n_days, 5);
    assert_eq!(report.n_readings, 5 * common::STEPS_PER_DAY as usize);
    assert_eq!(report.scenarios.len(), 1 + config.simulation.scenario_starting_soc.len());
    assert_eq!(report.scenarios[0].label, "continuous");
    for s in &report.scenarios {
        assert_eq!(s.daily_results.len(), 5);
        assert_eq!(s.summary.total_days, 5);
    }
    assert!(report.scenario("scenario_25%").is_some());
    assert!(report.cost.is_some());
    assert!(report.billing.is_none());
}

#[test]
fn billing_is_reconciled_for_months_with_readings() {
    let mut config = AnalysisConfig::baseline();
    config.billing.insert(YearMonth::new(2025, 7), july_bill());
    config.billing.insert(YearMonth::new(2025, 8), july_bill());
    let days = july_days();

    let report = analyze(&config, &days).unwrap();
    let billing = report.billing.expect("billing configured");

    // August has no readings and is skipped
    assert_eq!(billing.monthly.len(), 1);
    let july = &billing.monthly[0];
    assert_eq!(july.month, YearMonth::new(2025, 7));
    assert_eq!(july.days, 5);
    let billed_import = 28.75 + 657.57 + 269.27;
    assert!((july.estimated_consumption_kwh - billed_import).abs() < 1e-6);
    assert!(july.savings > 0.0);

    let annual = &billing.annual;
    assert_eq!(annual.months, 1);
    assert!((annual.annual_savings - july.savings * 12.0).abs() < 1e-9);
    assert_eq!(annual.net_investment, config.investment.net_investment());
    let payback = annual.payback_years.expect("positive savings");
    assert!((payback - annual.net_investment / annual.annual_savings).abs() < 1e-9);
}

#[test]
fn finance_comparison_covers_enabled_lenders() {
    let config = AnalysisConfig::baseline();
    let report = analyze(&config, &july_days()).unwrap();

    let enabled = config.finance.lenders.iter().filter(|l| l.enabled).count();
    assert_eq!(report.finance.options.len(), enabled);
    assert_eq!(report.finance.principal, config.investment.net_investment());
    assert!(report.finance.offset_cost.is_some());

    let best = report.finance.recommended.as_ref().expect("a recommendation");
    let cheapest_loan = report
        .finance
        .options
        .iter()
        .map(|o| o.cost.total_cost)
        .fold(f64::INFINITY, f64::min);
    let cheapest = report.finance.offset_cost.map_or(cheapest_loan, |o| o.min(cheapest_loan));
    assert_eq!(best.total_cost, cheapest);
}

#[test]
fn fully_rebated_battery_still_gets_a_report() {
    let mut config = AnalysisConfig::baseline();
    config.investment.rebate = config.investment.battery_cost;

    let report = analyze(&config, &july_days()).unwrap();

    assert_eq!(report.finance.principal, 0.0);
    assert!(!report.finance.options.is_empty());
    for o in &report.finance.options {
        assert_eq!(o.effective_apr_pct.is_none(), o.apr_error.is_some(), "{}", o.name);
    }
    assert!(report.finance.options.iter().any(|o| o.apr_error.is_some()));
    let best = report.finance.recommended.as_ref().expect("offset is always priced");
    assert!(best.is_offset);
    assert_eq!(best.total_cost, 0.0);
    assert!(report.to_string().contains("n/a"));
}

#[test]
fn promotion_shortens_payback() {
    let mut config = AnalysisConfig::compact();
    config.promotion = Some(PromotionConfig::default());
    config.billing.insert(YearMonth::new(2026, 7), july_bill());
    // Overcast days leave the promotion window free for grid charging
    let csv = to_csv(&common::household_days(common::date(2026, 7, 1), 5, 0.0));
    let days = load_reader(csv.as_bytes()).unwrap();

    let report = analyze(&config, &days).unwrap();

    let cost = report.cost.as_ref().unwrap();
    let plain = report.cost_without_promotion.as_ref().expect("promotion configured");
    assert!(cost.free_charge_kwh > 0.0);
    assert_eq!(plain.free_charge_kwh, 0.0);
    assert!(cost.savings > plain.savings);

    let billing = report.billing.as_ref().unwrap();
    let without = billing.annual_without_promotion.as_ref().expect("promotion configured");
    assert!(billing.annual.annual_savings > without.annual_savings);
    let with_payback = billing.annual.payback_years.expect("promotion pays");
    assert!(without.payback_years.is_none_or(|years| with_payback < years));
    assert!(report.to_string().contains("Without promotion"));
}

#[test]
fn no_promotion_means_no_comparison() {
    let mut config = AnalysisConfig::compact();
    config.billing.insert(YearMonth::new(2025, 7), july_bill());
    let report = analyze(&config, &july_days()).unwrap();

    assert!(report.cost_without_promotion.is_none());
    assert!(report.billing.unwrap().annual_without_promotion.is_none());
}

#[test]
fn report_serializes_to_json() {
    let mut config = AnalysisConfig::compact();
    config.billing.insert(YearMonth::new(2025, 7), july_bill());
    let report = analyze(&config, &july_days()).unwrap();

    let mut buf = Vec::new();
    write_json(&report, &mut buf).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

    assert!(json["battery_spec"].is_object());
    let scenarios = json["scenarios"].as_array().unwrap();
    assert_eq!(scenarios.len(), report.scenarios.len());
    assert!(scenarios[0]["summary"].is_object());
    assert_eq!(scenarios[0]["daily_results"].as_array().unwrap().len(), 5);
    assert_eq!(json["billing"]["monthly_results"].as_array().unwrap().len(), 1);
    assert!(json["billing"]["annual"]["annual_savings"].is_number());
    assert!(json["finance"]["options"].is_array());
}

#[test]
fn daily_csv_has_a_row_per_scenario_day() {
    let config = AnalysisConfig::compact();
    let report = analyze(&config, &july_days()).unwrap();

    let mut buf = Vec::new();
    write_daily_csv(&report.scenarios, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert!(lines[0].starts_with("scenario,date,total_solar_kwh"));
    assert_eq!(lines.len(), 1 + report.scenarios.len() * 5);
    assert!(lines[1].starts_with("continuous,2025-07-01,"));
}

#[test]
fn printed_report_mentions_every_scenario() {
    let config = AnalysisConfig::compact();
    let report = analyze(&config, &july_days()).unwrap();

    let text = report.to_string();
    for s in &report.scenarios {
        assert!(text.contains(&s.policy.to_string()), "missing {}", s.policy);
    }
    assert!(text.contains("Continuous (initial 50%)"));
}
