//! Post-hoc statistics over a collection of daily results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveTime, Timelike};
use serde::Serialize;

use super::types::DailyResult;

/// Southern-hemisphere meteorological season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl Season {
    pub const fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Self::Summer,
            3..=5 => Self::Autumn,
            6..=8 => Self::Winter,
            _ => Self::Spring,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summer => "Summer",
            Self::Autumn => "Autumn",
            Self::Winter => "Winter",
            Self::Spring => "Spring",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Aggregates for the days falling in one season.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalStats {
    pub total_days: usize,
    pub days_reached_full: usize,
    pub pct_days_full: f64,
    pub avg_solar_kwh: f64,
    pub avg_max_soc_kwh: f64,
    /// Mean time-to-full as `HH:MM`, `None` if no day reached full.
    pub avg_time_to_full: Option<String>,
}

/// Aggregate statistics over one run's daily results.
///
/// Every ratio and average is defined on empty input: counts and
/// percentages are 0, time-of-day values are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_days: usize,
    pub days_reached_full: usize,
    pub pct_days_full: f64,
    /// Mean time-to-full in minutes from midnight.
    pub avg_time_to_full_minutes: Option<f64>,
    /// Mean time-to-full as `HH:MM`.
    pub avg_time_to_full: Option<String>,
    pub earliest_full: Option<NaiveTime>,
    pub latest_full: Option<NaiveTime>,
    /// Mean SOC per hour of day across all days with readings in that hour (kWh).
    pub avg_hourly_soc: BTreeMap<u32, f64>,
    pub seasonal: BTreeMap<Season, SeasonalStats>,
}

impl SummaryStats {
    pub fn from_daily(daily: &[DailyResult]) -> Self {
        let full_minutes = full_minutes(daily.iter());
        let avg_minutes = mean(&full_minutes);

        let mut hourly: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for day in daily {
            for (&hour, &soc) in &day.hourly_soc {
                let bucket = hourly.entry(hour).or_insert((0.0, 0));
                bucket.0 += soc;
                bucket.1 += 1;
            }
        }

        let mut by_season: BTreeMap<Season, Vec<&DailyResult>> = BTreeMap::new();
        for day in daily {
            by_season
                .entry(Season::from_month(day.date.month()))
                .or_default()
                .push(day);
        }

        Self {
            total_days: daily.len(),
            days_reached_full: full_minutes.len(),
            pct_days_full: percent(full_minutes.len(), daily.len()),
            avg_time_to_full_minutes: avg_minutes,
            avg_time_to_full: avg_minutes.map(format_hhmm),
            earliest_full: daily.iter().filter_map(|d| d.time_to_full).map(|t| t.time()).min(),
            latest_full: daily.iter().filter_map(|d| d.time_to_full).map(|t| t.time()).max(),
            avg_hourly_soc: hourly
                .into_iter()
                .map(|(hour, (sum, n))| (hour, sum / n as f64))
                .collect(),
            seasonal: by_season
                .into_iter()
                .map(|(season, days)| (season, SeasonalStats::from_days(&days)))
                .collect(),
        }
    }
}

impl SeasonalStats {
    fn from_days(days: &[&DailyResult]) -> Self {
        let n = days.len();
        let full_minutes = full_minutes(days.iter().copied());
        let solar: Vec<f64> = days.iter().map(|d| d.total_solar_kwh).collect();
        let max_soc: Vec<f64> = days.iter().map(|d| d.max_soc_kwh).collect();
        Self {
            total_days: n,
            days_reached_full: full_minutes.len(),
            pct_days_full: percent(full_minutes.len(), n),
            avg_solar_kwh: mean(&solar).unwrap_or(0.0),
            avg_max_soc_kwh: mean(&max_soc).unwrap_or(0.0),
            avg_time_to_full: mean(&full_minutes).map(format_hhmm),
        }
    }
}

fn full_minutes<'a>(days: impl Iterator<Item = &'a DailyResult>) -> Vec<f64> {
    days.filter_map(|d| d.time_to_full)
        .map(|t| f64::from(t.hour() * 60 + t.minute()))
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Formats minutes from midnight as `HH:MM`, truncating seconds.
pub fn format_hhmm(minutes: f64) -> String {
    let total = minutes.max(0.0) as u32;
    format!("{:02}:{:02}", total / 60, total % 60)
}

impl fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let none = || "n/a".to_string();
        writeln!(
            f,
            "  Days reached full:   {}/{} ({:.1}%)",
            self.days_reached_full, self.total_days, self.pct_days_full
        )?;
        writeln!(
            f,
            "  Avg time to full:    {}",
            self.avg_time_to_full.clone().unwrap_or_else(none)
        )?;
        writeln!(
            f,
            "  Earliest / latest:   {} / {}",
            self.earliest_full
                .map_or_else(none, |t| t.format("%H:%M").to_string()),
            self.latest_full
                .map_or_else(none, |t| t.format("%H:%M").to_string()),
        )?;
        for (season, s) in &self.seasonal {
            writeln!(
                f,
                "  {:<7} {:>4} days  full {:>5.1}%  solar {:>6.2} kWh/day  max SoC {:>6.2} kWh  avg full {}",
                season,
                s.total_days,
                s.pct_days_full,
                s.avg_solar_kwh,
                s.avg_max_soc_kwh,
                s.avg_time_to_full.clone().unwrap_or_else(none),
            )?;
        }
        Ok(())
    }
}
