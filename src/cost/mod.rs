/// Per-period costs and savings against the no-battery baseline.
pub mod aggregator;
/// Monthly bill reconciliation and payback.
pub mod billing;

pub use aggregator::{CostAggregator, CostBreakdown, EnergyFlows, PeriodCost, SavingsReport};
pub use billing::{
    AnnualRollup, BillingMonth, BillingReconciler, BillingReport, ConsumptionProfile,
    MonthlyResult, YearMonth,
};
