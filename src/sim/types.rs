//! Core simulation types: timing parameters, per-step records, and per-day results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::tariff::RatePeriod;

/// Timing and behavioral parameters shared by both policies.
///
/// # Examples
///
/// ```
/// use battery_roi::sim::types::SimParams;
///
/// let params = SimParams::new(5);
/// assert!((params.dt_hours - 1.0 / 12.0).abs() < 1e-12);
/// assert_eq!(params.interval.num_minutes(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimParams {
    /// Fixed sampling interval of the input series.
    #[serde(skip)]
    pub interval: TimeDelta,
    /// Sampling interval in hours, used for rectangular energy integration.
    pub dt_hours: f64,
    /// Solar charging is allowed from this hour (inclusive)...
    pub daylight_start_hour: u32,
    /// ...until this hour (exclusive).
    pub daylight_end_hour: u32,
    /// Continuous-policy time-to-full is only recorded from this hour (inclusive)...
    pub full_window_start_hour: u32,
    /// ...until this hour (exclusive).
    pub full_window_end_hour: u32,
    /// Peak-period discharge begins at this hour.
    pub evening_start_hour: u32,
    /// Assumed household draw served from the battery in the evening peak (W).
    pub household_draw_w: f64,
    /// Overnight grid top-up runs while SOC is below this fraction of usable capacity.
    pub topup_threshold: f64,
    /// Fraction of usable capacity that counts as "full".
    pub full_threshold: f64,
}

impl SimParams {
    /// Creates parameters for the given sampling interval with the standard
    /// daylight, evening, and threshold settings.
    ///
    /// # Panics
    ///
    /// Panics if `interval_minutes` is zero.
    pub fn new(interval_minutes: u32) -> Self {
        assert!(interval_minutes > 0, "interval_minutes must be > 0");
        Self {
            interval: TimeDelta::minutes(i64::from(interval_minutes)),
            dt_hours: f64::from(interval_minutes) / 60.0,
            daylight_start_hour: 6,
            daylight_end_hour: 18,
            full_window_start_hour: 6,
            full_window_end_hour: 20,
            evening_start_hour: 18,
            household_draw_w: 2000.0,
            topup_threshold: 0.8,
            full_threshold: 0.95,
        }
    }

    pub fn is_daylight(&self, hour: u32) -> bool {
        (self.daylight_start_hour..self.daylight_end_hour).contains(&hour)
    }

    pub fn in_full_window(&self, hour: u32) -> bool {
        (self.full_window_start_hour..self.full_window_end_hour).contains(&hour)
    }

    /// Converts a power held for one interval into energy (kWh).
    pub fn energy_kwh(&self, power_w: f64) -> f64 {
        power_w * self.dt_hours / 1000.0
    }
}

/// What the battery did during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Charging from solar surplus.
    Charging,
    /// Serving the evening household draw.
    Discharging,
    /// Charging from the grid (overnight top-up or free window).
    GridTopping,
    Idle,
}

/// Complete record of one simulation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub timestamp: NaiveDateTime,
    pub rate_period: RatePeriod,
    pub mode: StepMode,
    /// Solar energy generated over the step (kWh).
    pub solar_kwh: f64,
    /// Household energy consumed over the step (kWh).
    pub consumption_kwh: f64,
    /// Energy added to SOC, after efficiency (kWh).
    pub charge_kwh: f64,
    /// Energy removed from SOC (kWh).
    pub discharge_kwh: f64,
    /// Energy bought from the grid (kWh).
    pub grid_import_kwh: f64,
    /// Energy exported to the grid (kWh).
    pub grid_export_kwh: f64,
    /// Energy drawn from the grid for free inside the promotion window (kWh).
    pub free_charge_kwh: f64,
    /// SOC after the step (kWh).
    pub soc_kwh: f64,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<8} {:<12} | solar={:.3} load={:.3} | +{:.3} -{:.3} kWh | \
             import={:.3} export={:.3} free={:.3} | SoC={:.2} kWh",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.rate_period,
            format!("{:?}", self.mode),
            self.solar_kwh,
            self.consumption_kwh,
            self.charge_kwh,
            self.discharge_kwh,
            self.grid_import_kwh,
            self.grid_export_kwh,
            self.free_charge_kwh,
            self.soc_kwh,
        )
    }
}

/// Summary of one simulated calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyResult {
    pub date: NaiveDate,
    pub total_solar_kwh: f64,
    pub starting_soc_kwh: f64,
    pub ending_soc_kwh: f64,
    pub min_soc_kwh: f64,
    pub max_soc_kwh: f64,
    /// Highest SOC as a percentage of usable capacity.
    pub filled_pct: f64,
    /// Energy added to SOC over the day (kWh).
    pub charge_kwh: f64,
    /// Energy removed from SOC over the day (kWh).
    pub discharge_kwh: f64,
    /// First timestamp at which SOC reached the full threshold, if any.
    pub time_to_full: Option<NaiveDateTime>,
    /// Mean SOC per hour of day (kWh), only for hours with readings.
    pub hourly_soc: BTreeMap<u32, f64>,
}

impl DailyResult {
    pub fn reached_full(&self) -> bool {
        self.time_to_full.is_some()
    }
}
