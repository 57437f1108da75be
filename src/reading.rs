//! Canonical power readings, the raw-row normalizer, and day batching.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::tariff::RatePeriod;

/// Timestamp layouts accepted from inverter exports and canonical CSV files.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
];

/// One instantaneous sample of solar generation and household consumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    /// Solar generation (W, >= 0).
    pub solar_power_w: f64,
    /// Household consumption (W, >= 0), estimated or sub-metered.
    pub consumption_power_w: f64,
    /// Tariff period derived from the timestamp.
    pub rate_period: RatePeriod,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, solar_power_w: f64, consumption_power_w: f64) -> Self {
        Self {
            timestamp,
            solar_power_w,
            consumption_power_w,
            rate_period: RatePeriod::at(timestamp),
        }
    }

    /// A reading with no known consumption.
    pub fn solar_only(timestamp: NaiveDateTime, solar_power_w: f64) -> Self {
        Self::new(timestamp, solar_power_w, 0.0)
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    #[must_use]
    pub fn with_consumption(mut self, consumption_power_w: f64) -> Self {
        self.consumption_power_w = consumption_power_w;
        self
    }
}

/// A row as it arrives from a loader, before coercion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReading {
    #[serde(alias = "RTCTime", alias = "datetime")]
    pub timestamp: String,
    #[serde(default, alias = "Power Now (W)")]
    pub solar_power_w: Option<String>,
    #[serde(default, alias = "consumption_w")]
    pub consumption_power_w: Option<String>,
}

impl RawReading {
    /// Coerces the row into a [`Reading`].
    ///
    /// Missing, non-numeric, non-finite, and negative powers become 0 W.
    /// Returns `None` when the timestamp cannot be parsed.
    pub fn normalize(&self) -> Option<Reading> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        Some(Reading::new(
            timestamp,
            coerce_power(self.solar_power_w.as_deref()),
            coerce_power(self.consumption_power_w.as_deref()),
        ))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn coerce_power(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map_or(0.0, |v| v.max(0.0))
}

/// Ordered readings that all fall on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBatch {
    pub date: NaiveDate,
    pub readings: Vec<Reading>,
}

impl DayBatch {
    pub fn new(date: NaiveDate, readings: Vec<Reading>) -> Self {
        Self { date, readings }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Checks ordering and day membership, and counts spacing irregularities
    /// against the sampling interval.
    ///
    /// Timestamps may jitter by up to half an interval either way; anything
    /// further off is counted as a gap or an early sample, both tolerated.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError`] for readings outside the batch's day or readings
    /// not strictly increasing in time.
    pub fn validate_spacing(&self, interval: TimeDelta) -> Result<Spacing, SimError> {
        let tolerance = interval / 2;
        let mut spacing = Spacing::default();
        let mut previous: Option<NaiveDateTime> = None;
        for reading in &self.readings {
            if reading.date() != self.date {
                return Err(SimError::OutsideDay {
                    date: self.date,
                    at: reading.timestamp,
                });
            }
            if let Some(previous) = previous {
                let delta = reading.timestamp - previous;
                if delta <= TimeDelta::zero() {
                    return Err(SimError::OutOfOrder {
                        previous,
                        at: reading.timestamp,
                    });
                }
                if delta < interval - tolerance {
                    spacing.early += 1;
                } else if delta > interval + tolerance {
                    spacing.gaps += 1;
                }
            }
            previous = Some(reading.timestamp);
        }
        Ok(spacing)
    }
}

/// Spacing irregularities found in one day batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spacing {
    /// Intervals longer than expected (missing samples).
    pub gaps: usize,
    /// Samples arriving well before the next expected time.
    pub early: usize,
}

/// Sorts readings, drops duplicate timestamps (first wins), and splits them
/// into one batch per calendar day.
pub fn group_by_day(mut readings: Vec<Reading>) -> Vec<DayBatch> {
    readings.sort_by_key(|r| r.timestamp);
    readings.dedup_by_key(|r| r.timestamp);
    readings
        .chunk_by(|a, b| a.date() == b.date())
        .map(|chunk| DayBatch::new(chunk[0].date(), chunk.to_vec()))
        .collect()
}
