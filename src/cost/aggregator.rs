//! Per-period energy costs, the no-battery baseline, and savings.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::reading::DayBatch;
use crate::sim::{SimParams, StepResult};
use crate::tariff::{RatePeriod, TariffRates};

/// Grid energy flows partitioned by rate period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyFlows {
    pub import_kwh: BTreeMap<RatePeriod, f64>,
    pub export_kwh: BTreeMap<RatePeriod, f64>,
    /// Grid energy drawn at no cost inside the promotion window.
    pub free_charge_kwh: f64,
    /// Distinct calendar days covered, for the supply charge.
    pub days: usize,
}

impl EnergyFlows {
    fn empty() -> Self {
        Self {
            import_kwh: RatePeriod::ALL.iter().map(|p| (*p, 0.0)).collect(),
            export_kwh: RatePeriod::ALL.iter().map(|p| (*p, 0.0)).collect(),
            ..Self::default()
        }
    }

    fn add(&mut self, period: RatePeriod, import_kwh: f64, export_kwh: f64) {
        *self.import_kwh.entry(period).or_insert(0.0) += import_kwh;
        *self.export_kwh.entry(period).or_insert(0.0) += export_kwh;
    }

    /// Collects the grid flows recorded by a simulation run.
    pub fn from_steps(steps: &[StepResult]) -> Self {
        let mut flows = Self::empty();
        let mut dates = BTreeSet::new();
        for step in steps {
            flows.add(step.rate_period, step.grid_import_kwh, step.grid_export_kwh);
            flows.free_charge_kwh += step.free_charge_kwh;
            dates.insert(step.timestamp.date());
        }
        flows.days = dates.len();
        flows
    }

    /// Flows for the same readings with no battery installed.
    ///
    /// Consumption is served first by simultaneous solar, then by the grid;
    /// leftover solar is exported.
    pub fn without_battery(days: &[DayBatch], params: &SimParams) -> Self {
        let mut flows = Self::empty();
        for reading in days.iter().flat_map(|d| &d.readings) {
            let solar = params.energy_kwh(reading.solar_power_w);
            let load = params.energy_kwh(reading.consumption_power_w);
            let self_used = solar.min(load);
            flows.add(reading.rate_period, load - self_used, solar - self_used);
        }
        flows.days = days.iter().filter(|d| !d.is_empty()).count();
        flows
    }

    pub fn total_import_kwh(&self) -> f64 {
        self.import_kwh.values().sum()
    }

    pub fn total_export_kwh(&self) -> f64 {
        self.export_kwh.values().sum()
    }
}

/// Cost of one rate period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodCost {
    pub import_kwh: f64,
    pub export_kwh: f64,
    pub import_cost: f64,
    pub export_credit: f64,
}

/// Energy costs under one tariff.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub periods: BTreeMap<RatePeriod, PeriodCost>,
    pub total_import_cost: f64,
    pub total_export_credit: f64,
    /// Import cost minus export credit; excludes the supply charge.
    pub net_cost: f64,
    /// Fixed daily supply charge over the covered days.
    pub supply_cost: f64,
}

impl CostBreakdown {
    pub fn from_flows(flows: &EnergyFlows, rates: &TariffRates) -> Self {
        let periods: BTreeMap<RatePeriod, PeriodCost> = RatePeriod::ALL
            .iter()
            .map(|&period| {
                let import_kwh = flows.import_kwh.get(&period).copied().unwrap_or(0.0);
                let export_kwh = flows.export_kwh.get(&period).copied().unwrap_or(0.0);
                let cost = PeriodCost {
                    import_kwh,
                    export_kwh,
                    import_cost: import_kwh * rates.import_rate(period),
                    export_credit: export_kwh * rates.feed_in,
                };
                (period, cost)
            })
            .collect();

        let total_import_cost: f64 = periods.values().map(|p| p.import_cost).sum();
        let total_export_credit: f64 = periods.values().map(|p| p.export_credit).sum();
        Self {
            periods,
            total_import_cost,
            total_export_credit,
            net_cost: total_import_cost - total_export_credit,
            supply_cost: flows.days as f64 * rates.supply_per_day,
        }
    }

    /// Net cost plus the supply charge.
    pub fn total_bill(&self) -> f64 {
        self.net_cost + self.supply_cost
    }
}

/// Side-by-side costs with and without the battery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsReport {
    pub no_battery: CostBreakdown,
    pub with_battery: CostBreakdown,
    pub free_charge_kwh: f64,
    /// Free-charge energy valued at the peak import rate.
    pub free_charge_value: f64,
    pub savings: f64,
    /// Savings relative to the no-battery net cost; 0 unless that cost is positive.
    pub savings_percent: f64,
}

impl SavingsReport {
    pub fn compare(no_battery: &EnergyFlows, with_battery: &EnergyFlows, rates: &TariffRates) -> Self {
        let no_battery = CostBreakdown::from_flows(no_battery, rates);
        let free_charge_kwh = with_battery.free_charge_kwh;
        let with_battery = CostBreakdown::from_flows(with_battery, rates);
        let free_charge_value = free_charge_kwh * rates.peak;
        let savings = no_battery.net_cost - with_battery.net_cost + free_charge_value;
        Self {
            savings_percent: savings_percent(savings, no_battery.net_cost),
            no_battery,
            with_battery,
            free_charge_kwh,
            free_charge_value,
            savings,
        }
    }
}

/// `savings / baseline × 100`, or 0 when the baseline is not a positive cost.
pub fn savings_percent(savings: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        0.0
    } else {
        savings / baseline * 100.0
    }
}

/// Prices simulation runs against one tariff.
#[derive(Debug, Clone, Copy)]
pub struct CostAggregator<'a> {
    rates: &'a TariffRates,
    params: &'a SimParams,
}

impl<'a> CostAggregator<'a> {
    pub fn new(rates: &'a TariffRates, params: &'a SimParams) -> Self {
        Self { rates, params }
    }

    /// Compares a run's recorded flows against the no-battery baseline of
    /// the readings it was simulated from.
    pub fn savings(&self, days: &[DayBatch], steps: &[StepResult]) -> SavingsReport {
        let baseline = EnergyFlows::without_battery(days, self.params);
        let with_battery = EnergyFlows::from_steps(steps);
        SavingsReport::compare(&baseline, &with_battery, self.rates)
    }
}
