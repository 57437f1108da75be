//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use battery_roi::battery::BatterySpec;
use battery_roi::reading::{DayBatch, Reading};
use battery_roi::sim::SimParams;

/// Steps per day at the default 5-minute interval.
pub const STEPS_PER_DAY: u32 = 288;

/// 10 kWh fully usable battery (4.3 kW charge, 4.9 kW discharge, 96%).
pub fn compact_battery() -> BatterySpec {
    BatterySpec::new(10.0, 1.0, 4.3, 4.9, 0.96)
}

/// The measured household battery: 28.8 kWh at 95% depth of discharge.
pub fn baseline_battery() -> BatterySpec {
    BatterySpec::new(28.8, 0.95, 4.3, 4.9, 0.96)
}

/// Standard parameters at a 5-minute interval.
pub fn default_params() -> SimParams {
    SimParams::new(5)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

/// A full day of 5-minute readings with `(solar_w, consumption_w)` given by
/// `profile(timestamp)`.
pub fn day_with(date: NaiveDate, profile: impl Fn(NaiveDateTime) -> (f64, f64)) -> DayBatch {
    let start = at(date, 0, 0);
    let readings = (0..STEPS_PER_DAY)
        .map(|i| {
            let ts = start + TimeDelta::minutes(5 * i64::from(i));
            let (solar, consumption) = profile(ts);
            Reading::new(ts, solar, consumption)
        })
        .collect();
    DayBatch::new(date, readings)
}

/// Constant solar of `watts` over `[start_hour, end_hour)`, no consumption.
pub fn solar_block_day(date: NaiveDate, start_hour: u32, end_hour: u32, watts: f64) -> DayBatch {
    use chrono::Timelike;
    day_with(date, |ts| {
        let solar = if (start_hour..end_hour).contains(&ts.hour()) {
            watts
        } else {
            0.0
        };
        (solar, 0.0)
    })
}

/// Bell-shaped solar peaking at `peak_w` around 12:00 plus a household
/// load with morning and evening peaks.
pub fn household_day(date: NaiveDate, peak_w: f64) -> DayBatch {
    use chrono::Timelike;
    day_with(date, |ts| {
        let h = f64::from(ts.hour()) + f64::from(ts.minute()) / 60.0;
        let solar = if (6.0..18.0).contains(&h) {
            peak_w * (std::f64::consts::PI * (h - 6.0) / 12.0).sin()
        } else {
            0.0
        };
        let load = match ts.hour() {
            6..=8 => 1800.0,
            17..=21 => 2500.0,
            _ => 500.0,
        };
        (solar, load)
    })
}

/// `n` consecutive household days starting at `first`.
pub fn household_days(first: NaiveDate, n: u32, peak_w: f64) -> Vec<DayBatch> {
    (0..n)
        .map(|i| household_day(first + TimeDelta::days(i64::from(i)), peak_w))
        .collect()
}
