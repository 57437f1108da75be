//! Runs every configured policy over the readings and assembles the report.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::battery::BatterySpec;
use crate::config::AnalysisConfig;
use crate::cost::{BillingReconciler, BillingReport, CostAggregator, SavingsReport};
use crate::error::AnalysisError;
use crate::finance::{self, FinanceComparison};
use crate::reading::DayBatch;
use crate::sim::{DailyResult, Engine, Policy, SimulationRun, SummaryStats};

/// One policy's daily results and their summary.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub policy: Policy,
    pub label: String,
    pub summary: SummaryStats,
    pub daily_results: Vec<DailyResult>,
}

impl From<SimulationRun> for ScenarioResult {
    fn from(run: SimulationRun) -> Self {
        Self {
            label: run.policy.label(),
            summary: SummaryStats::from_daily(&run.daily),
            policy: run.policy,
            daily_results: run.daily,
        }
    }
}

/// Everything the analysis produces, ready to print or serialise.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub battery_spec: BatterySpec,
    pub n_days: usize,
    pub n_readings: usize,
    /// Continuous policy first, then the what-if scenarios in configured order.
    pub scenarios: Vec<ScenarioResult>,
    /// Continuous-policy costs against the no-battery baseline.
    pub cost: Option<SavingsReport>,
    /// The same continuous run priced without the free-charging window;
    /// present only when a promotion is configured.
    pub cost_without_promotion: Option<SavingsReport>,
    /// Present when the configuration carries monthly bills.
    pub billing: Option<BillingReport>,
    pub finance: FinanceComparison,
}

impl AnalysisReport {
    pub fn scenario(&self, label: &str) -> Option<&ScenarioResult> {
        self.scenarios.iter().find(|s| s.label == label)
    }
}

/// Runs the full analysis. `config` must already be validated.
///
/// # Errors
///
/// Returns an [`AnalysisError`] if the readings violate the engine's ordering
/// rules or a lender has no repayments. A lender whose APR cannot be solved
/// is reported without a rate instead.
pub fn analyze(config: &AnalysisConfig, days: &[DayBatch]) -> Result<AnalysisReport, AnalysisError> {
    let spec = config.battery_spec();
    let params = config.sim_params();
    let window = config.free_window();
    let engine = Engine::new(&spec, &params).with_free_window(window.as_ref());

    let runs = config
        .policies()
        .into_par_iter()
        .map(|policy| engine.run(policy, days))
        .collect::<Result<Vec<_>, _>>()?;

    let tariffs = config.tariff_schedule();
    let aggregator = CostAggregator::new(&tariffs.default, &params);
    let continuous = runs.iter().find(|r| !r.policy.resets_daily());
    let cost = continuous.map(|r| aggregator.savings(days, &r.steps));
    let cost_without_promotion = match (continuous, window.as_ref()) {
        (Some(r), Some(_)) => {
            let plain = engine.with_free_window(None).run(r.policy, days)?;
            Some(aggregator.savings(days, &plain.steps))
        }
        _ => None,
    };

    let billing = if config.billing.is_empty() {
        None
    } else {
        let reconciler = BillingReconciler::new(
            engine,
            &tariffs,
            &config.consumption_profile,
            config.simulation.continuous_initial_soc,
        );
        Some(reconciler.reconcile(
            days,
            &config.billing,
            config.investment.net_investment(),
        )?)
    };

    let finance = finance::compare(
        config.investment.net_investment(),
        &config.finance.lenders,
        config.finance.mortgage_rate_pct,
        config.finance.compare_offset,
    )?;

    let n_readings = days.iter().map(|d| d.readings.len()).sum();
    info!(
        n_days = days.len(),
        n_readings,
        n_scenarios = runs.len(),
        "analysis finished"
    );

    Ok(AnalysisReport {
        battery_spec: spec,
        n_days: days.len(),
        n_readings,
        scenarios: runs.into_iter().map(ScenarioResult::from).collect(),
        cost,
        cost_without_promotion,
        billing,
        finance,
    })
}
