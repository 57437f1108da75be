//! Per-day accumulation of step records into a [`DailyResult`].

use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};

use super::types::{DailyResult, StepResult};

/// Running totals for the day currently being simulated.
#[derive(Debug, Clone)]
pub(crate) struct DayAccumulator {
    date: NaiveDate,
    starting_soc_kwh: f64,
    min_soc_kwh: f64,
    max_soc_kwh: f64,
    total_solar_kwh: f64,
    charge_kwh: f64,
    discharge_kwh: f64,
    /// hour -> (sum, count)
    hourly: BTreeMap<u32, (f64, usize)>,
}

impl DayAccumulator {
    pub(crate) fn new(date: NaiveDate, starting_soc_kwh: f64) -> Self {
        Self {
            date,
            starting_soc_kwh,
            min_soc_kwh: starting_soc_kwh,
            max_soc_kwh: starting_soc_kwh,
            total_solar_kwh: 0.0,
            charge_kwh: 0.0,
            discharge_kwh: 0.0,
            hourly: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, step: &StepResult) {
        self.total_solar_kwh += step.solar_kwh;
        self.charge_kwh += step.charge_kwh;
        self.discharge_kwh += step.discharge_kwh;
        self.min_soc_kwh = self.min_soc_kwh.min(step.soc_kwh);
        self.max_soc_kwh = self.max_soc_kwh.max(step.soc_kwh);

        let bucket = self.hourly.entry(step.timestamp.hour()).or_insert((0.0, 0));
        bucket.0 += step.soc_kwh;
        bucket.1 += 1;
    }

    pub(crate) fn finish(
        self,
        ending_soc_kwh: f64,
        usable_kwh: f64,
        time_to_full: Option<chrono::NaiveDateTime>,
    ) -> DailyResult {
        let hourly_soc = self
            .hourly
            .into_iter()
            .map(|(hour, (sum, count))| (hour, sum / count as f64))
            .collect();

        DailyResult {
            date: self.date,
            total_solar_kwh: self.total_solar_kwh,
            starting_soc_kwh: self.starting_soc_kwh,
            ending_soc_kwh,
            min_soc_kwh: self.min_soc_kwh,
            max_soc_kwh: self.max_soc_kwh,
            filled_pct: if usable_kwh > 0.0 {
                100.0 * self.max_soc_kwh / usable_kwh
            } else {
                0.0
            },
            charge_kwh: self.charge_kwh,
            discharge_kwh: self.discharge_kwh,
            time_to_full,
            hourly_soc,
        }
    }
}
