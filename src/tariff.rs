//! Time-of-use rate periods, the free-charging promotion window, and import/export prices.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::cost::billing::YearMonth;

/// Time-of-day tariff window with its own import price.
///
/// The three periods partition the 24-hour clock:
///
/// | Period     | Hours                       |
/// |------------|-----------------------------|
/// | `Sponge`   | 10:00–14:59                 |
/// | `Peak`     | 06:00–09:59, 18:00–23:59    |
/// | `OffPeak`  | 00:00–05:59, 15:00–17:59    |
///
/// # Examples
///
/// ```
/// use battery_roi::tariff::RatePeriod;
///
/// assert_eq!(RatePeriod::from_hour(12), RatePeriod::Sponge);
/// assert_eq!(RatePeriod::from_hour(19), RatePeriod::Peak);
/// assert_eq!(RatePeriod::from_hour(16), RatePeriod::OffPeak);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePeriod {
    Sponge,
    Peak,
    OffPeak,
}

impl RatePeriod {
    /// All periods in reporting order.
    pub const ALL: [Self; 3] = [Self::Sponge, Self::Peak, Self::OffPeak];

    /// Classifies an hour of the day (0–23).
    pub const fn from_hour(hour: u32) -> Self {
        debug_assert!(hour < 24);
        match hour {
            10..=14 => Self::Sponge,
            6..=9 | 18..=23 => Self::Peak,
            _ => Self::OffPeak,
        }
    }

    /// Classifies a timestamp by its hour.
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self::from_hour(timestamp.hour())
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sponge => "sponge",
            Self::Peak => "peak",
            Self::OffPeak => "off_peak",
        }
    }
}

impl fmt::Display for RatePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Date-gated window during which grid energy charges the battery at no cost.
///
/// Independent of [`RatePeriod`]: a sponge-period timestamp may also fall
/// inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreeChargeWindow {
    /// First calendar day on which the promotion applies.
    pub start_date: NaiveDate,
    /// First hour of the window (inclusive).
    pub start_hour: u32,
    /// End hour of the window (exclusive).
    pub end_hour: u32,
}

impl FreeChargeWindow {
    /// Creates a window active from `start_date`, daily over `[start_hour, end_hour)`.
    ///
    /// # Panics
    ///
    /// Panics if the hour range is empty or extends past midnight.
    pub fn new(start_date: NaiveDate, start_hour: u32, end_hour: u32) -> Self {
        assert!(start_hour < end_hour && end_hour <= 24);
        Self {
            start_date,
            start_hour,
            end_hour,
        }
    }

    /// Whether free charging is available at `timestamp`.
    pub fn is_active(&self, timestamp: NaiveDateTime) -> bool {
        timestamp.date() >= self.start_date
            && (self.start_hour..self.end_hour).contains(&timestamp.hour())
    }
}

/// Import prices per rate period, the feed-in credit, and the daily supply charge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffRates {
    /// Sponge-period import price ($/kWh).
    pub sponge: f64,
    /// Peak-period import price ($/kWh).
    pub peak: f64,
    /// Off-peak import price ($/kWh).
    pub off_peak: f64,
    /// Export credit ($/kWh).
    pub feed_in: f64,
    /// Fixed supply charge ($/day).
    pub supply_per_day: f64,
}

impl TariffRates {
    /// Import price for the given period.
    pub const fn import_rate(&self, period: RatePeriod) -> f64 {
        match period {
            RatePeriod::Sponge => self.sponge,
            RatePeriod::Peak => self.peak,
            RatePeriod::OffPeak => self.off_peak,
        }
    }
}

impl Default for TariffRates {
    fn default() -> Self {
        Self {
            sponge: 0.2701,
            peak: 0.5658,
            off_peak: 0.3882,
            feed_in: 0.055,
            supply_per_day: 1.2626,
        }
    }
}

/// Default rates with optional per-billing-month overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TariffSchedule {
    pub default: TariffRates,
    pub monthly: BTreeMap<YearMonth, TariffRates>,
}

impl TariffSchedule {
    pub fn flat(rates: TariffRates) -> Self {
        Self {
            default: rates,
            monthly: BTreeMap::new(),
        }
    }

    /// Rates in force for `month`, falling back to the default table.
    pub fn rates_for(&self, month: YearMonth) -> &TariffRates {
        self.monthly.get(&month).unwrap_or(&self.default)
    }
}
