//! Billing-reconciled savings: consumption estimated from monthly bills,
//! simulated month by month, and rolled up into an annual payback figure.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SimError;
use crate::reading::DayBatch;
use crate::sim::{Engine, Policy, StepResult};
use crate::tariff::{RatePeriod, TariffRates, TariffSchedule};

use super::aggregator::{EnergyFlows, SavingsReport};

/// Calendar month key, written `YYYY-M` (e.g. `2025-7`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// # Panics
    ///
    /// Panics if `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Self {
        assert!((1..=12).contains(&month), "month must be in 1..=12");
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-M, got {s:?}"))?;
        let year: i32 = year.parse().map_err(|_| format!("bad year in {s:?}"))?;
        let month: u32 = month.parse().map_err(|_| format!("bad month in {s:?}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in {s:?}"));
        }
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

/// Grid energy totals from one monthly bill (kWh).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillingMonth {
    pub sponge: f64,
    pub peak: f64,
    pub off_peak: f64,
    pub feed_in: f64,
}

impl BillingMonth {
    pub const fn import_kwh(&self, period: RatePeriod) -> f64 {
        match period {
            RatePeriod::Sponge => self.sponge,
            RatePeriod::Peak => self.peak,
            RatePeriod::OffPeak => self.off_peak,
        }
    }

    /// What the bill charged for energy, before the supply charge.
    pub fn billed_cost(&self, rates: &TariffRates) -> f64 {
        RatePeriod::ALL
            .iter()
            .map(|&p| self.import_kwh(p) * rates.import_rate(p))
            .sum::<f64>()
            - self.feed_in * rates.feed_in
    }
}

/// Relative household consumption per hour of day.
///
/// Only the ratios between hours of the same rate period matter: weights are
/// renormalised within each period before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumptionProfile(pub [f64; 24]);

impl Default for ConsumptionProfile {
    fn default() -> Self {
        Self([
            0.02, 0.015, 0.015, 0.015, 0.02, 0.03, // 00-05
            0.05, 0.07, 0.06, 0.04, 0.03, 0.03, // 06-11
            0.035, 0.04, 0.04, 0.045, 0.05, 0.055, // 12-17
            0.08, 0.09, 0.08, 0.06, 0.04, 0.03, // 18-23
        ])
    }
}

impl ConsumptionProfile {
    pub fn weight(&self, hour: u32) -> f64 {
        self.0[hour as usize % 24]
    }

    /// Spreads each billed period's energy over that period's readings in
    /// proportion to the hourly weights, replacing `consumption_power_w`.
    ///
    /// Within a period, hour `h` receives `E_p × w_h / Σw` kWh, split evenly
    /// across its readings, so the estimated energy of each period equals the
    /// billed import whenever that period has readings.
    pub fn estimate(&self, days: &[DayBatch], bill: &BillingMonth, dt_hours: f64) -> Vec<DayBatch> {
        let mut counts = [0usize; 24];
        for reading in days.iter().flat_map(|d| &d.readings) {
            counts[reading.timestamp.hour() as usize] += 1;
        }

        let mut period_weight: BTreeMap<RatePeriod, f64> = BTreeMap::new();
        for hour in (0..24u32).filter(|h| counts[*h as usize] > 0) {
            *period_weight.entry(RatePeriod::from_hour(hour)).or_insert(0.0) += self.weight(hour);
        }

        let mut power_w = [0.0f64; 24];
        for hour in 0..24u32 {
            let n = counts[hour as usize];
            let period = RatePeriod::from_hour(hour);
            let total_weight = period_weight.get(&period).copied().unwrap_or(0.0);
            if n == 0 || total_weight <= 0.0 {
                continue;
            }
            let hour_kwh = bill.import_kwh(period) * self.weight(hour) / total_weight;
            power_w[hour as usize] = hour_kwh * 1000.0 / (n as f64 * dt_hours);
        }

        days.iter()
            .map(|day| {
                let readings = day
                    .readings
                    .iter()
                    .map(|r| r.with_consumption(power_w[r.timestamp.hour() as usize]))
                    .collect();
                DayBatch::new(day.date, readings)
            })
            .collect()
    }
}

/// One billed month compared against its simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyResult {
    pub month: YearMonth,
    pub days: usize,
    pub solar_kwh: f64,
    pub estimated_consumption_kwh: f64,
    /// Energy cost straight from the bill.
    pub billed_cost: f64,
    /// Simulated cost without a battery.
    pub no_battery_cost: f64,
    /// Simulated cost with the battery under the continuous policy.
    pub with_battery_cost: f64,
    pub free_charge_kwh: f64,
    pub free_charge_value: f64,
    pub savings: f64,
    pub savings_percent: f64,
}

/// Totals over all reconciled months.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualRollup {
    pub months: usize,
    pub total_billed_cost: f64,
    pub total_no_battery_cost: f64,
    pub total_with_battery_cost: f64,
    pub total_free_charge_value: f64,
    pub total_savings: f64,
    /// `total_savings × 12 / months`.
    pub annual_savings: f64,
    pub net_investment: f64,
    /// `None` when the battery never pays for itself.
    pub payback_years: Option<f64>,
}

impl AnnualRollup {
    pub fn from_months(monthly: &[MonthlyResult], net_investment: f64) -> Self {
        let months = monthly.len();
        let sum = |f: fn(&MonthlyResult) -> f64| monthly.iter().map(f).sum::<f64>();
        let total_savings = sum(|m| m.savings);
        let annual_savings = if months == 0 {
            0.0
        } else {
            total_savings * 12.0 / months as f64
        };
        Self {
            months,
            total_billed_cost: sum(|m| m.billed_cost),
            total_no_battery_cost: sum(|m| m.no_battery_cost),
            total_with_battery_cost: sum(|m| m.with_battery_cost),
            total_free_charge_value: sum(|m| m.free_charge_value),
            total_savings,
            annual_savings,
            net_investment,
            payback_years: payback_years(net_investment, annual_savings),
        }
    }
}

/// Years to recover `net_investment`, or `None` if savings are not positive.
pub fn payback_years(net_investment: f64, annual_savings: f64) -> Option<f64> {
    (annual_savings > 0.0).then(|| net_investment / annual_savings)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingReport {
    #[serde(rename = "monthly_results")]
    pub monthly: Vec<MonthlyResult>,
    pub annual: AnnualRollup,
    /// The same months priced without the free-charging window; present
    /// only when a promotion is configured.
    pub annual_without_promotion: Option<AnnualRollup>,
}

/// Runs the continuous policy over bill-estimated consumption.
pub struct BillingReconciler<'a> {
    engine: Engine<'a>,
    tariffs: &'a TariffSchedule,
    profile: &'a ConsumptionProfile,
    initial_soc: f64,
}

impl<'a> BillingReconciler<'a> {
    pub fn new(
        engine: Engine<'a>,
        tariffs: &'a TariffSchedule,
        profile: &'a ConsumptionProfile,
        initial_soc: f64,
    ) -> Self {
        Self {
            engine,
            tariffs,
            profile,
            initial_soc,
        }
    }

    /// Reconciles every billed month that has readings.
    ///
    /// State of charge carries over from one month to the next. When the
    /// engine has a free-charging window, the same months are also priced
    /// without it so the promotion's worth shows in the rollups.
    ///
    /// # Errors
    ///
    /// Propagates [`SimError`] from the engine.
    pub fn reconcile(
        &self,
        days: &[DayBatch],
        bills: &BTreeMap<YearMonth, BillingMonth>,
        net_investment: f64,
    ) -> Result<BillingReport, SimError> {
        let dt_hours = self.engine.params().dt_hours;

        let mut estimated: Vec<(YearMonth, Vec<DayBatch>)> = Vec::new();
        for (&month, bill) in bills {
            let month_days: Vec<DayBatch> = days
                .iter()
                .filter(|d| YearMonth::of(d.date) == month && !d.is_empty())
                .cloned()
                .collect();
            if month_days.is_empty() {
                debug!(%month, "no readings for billed month");
                continue;
            }
            estimated.push((month, self.profile.estimate(&month_days, bill, dt_hours)));
        }

        let monthly = self.price_months(self.engine, &estimated, bills)?;
        let annual = AnnualRollup::from_months(&monthly, net_investment);
        let annual_without_promotion = match self.engine.free_window() {
            Some(_) => {
                let plain = self.price_months(self.engine.with_free_window(None), &estimated, bills)?;
                Some(AnnualRollup::from_months(&plain, net_investment))
            }
            None => None,
        };

        info!(
            months = annual.months,
            annual_savings = annual.annual_savings,
            "billing reconciliation finished"
        );
        Ok(BillingReport {
            monthly,
            annual,
            annual_without_promotion,
        })
    }

    /// Runs one continuous simulation across all estimated months and
    /// prices each month at its own rates.
    fn price_months(
        &self,
        engine: Engine<'_>,
        estimated: &[(YearMonth, Vec<DayBatch>)],
        bills: &BTreeMap<YearMonth, BillingMonth>,
    ) -> Result<Vec<MonthlyResult>, SimError> {
        let all_days: Vec<DayBatch> = estimated.iter().flat_map(|(_, d)| d.iter().cloned()).collect();
        let run = engine.run(
            Policy::Continuous {
                initial_soc: self.initial_soc,
            },
            &all_days,
        )?;

        let mut steps_by_month: BTreeMap<YearMonth, Vec<StepResult>> = BTreeMap::new();
        for step in run.steps {
            steps_by_month
                .entry(YearMonth::of(step.timestamp.date()))
                .or_default()
                .push(step);
        }

        let monthly = estimated
            .iter()
            .map(|(month, month_days)| {
                let rates = self.tariffs.rates_for(*month);
                let steps = steps_by_month.get(month).map_or(&[][..], Vec::as_slice);
                let report = SavingsReport::compare(
                    &EnergyFlows::without_battery(month_days, engine.params()),
                    &EnergyFlows::from_steps(steps),
                    rates,
                );
                let bill = bills.get(month).copied().unwrap_or_default();
                MonthlyResult {
                    month: *month,
                    days: month_days.len(),
                    solar_kwh: steps.iter().map(|s| s.solar_kwh).sum(),
                    estimated_consumption_kwh: steps.iter().map(|s| s.consumption_kwh).sum(),
                    billed_cost: bill.billed_cost(rates),
                    no_battery_cost: report.no_battery.net_cost,
                    with_battery_cost: report.with_battery.net_cost,
                    free_charge_kwh: report.free_charge_kwh,
                    free_charge_value: report.free_charge_value,
                    savings: report.savings,
                    savings_percent: report.savings_percent,
                }
            })
            .collect();
        Ok(monthly)
    }
}
