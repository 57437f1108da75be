//! TOML-based analysis configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::battery::{BatterySpec, EfficiencyConvention};
use crate::cost::billing::{BillingMonth, ConsumptionProfile, YearMonth};
use crate::finance::{LoanOption, PaymentFrequency};
use crate::sim::{Policy, SimParams};
use crate::tariff::{FreeChargeWindow, TariffRates, TariffSchedule};

/// Top-level analysis configuration parsed from TOML.
///
/// All fields have defaults matching the baseline household. Load from
/// TOML with [`AnalysisConfig::from_toml_file`] or use
/// [`AnalysisConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub battery: BatteryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub tariff: TariffConfig,
    /// Free-charging promotion; absent means none.
    #[serde(default)]
    pub promotion: Option<PromotionConfig>,
    /// Monthly bills keyed `"YYYY-M"`.
    #[serde(default)]
    pub billing: BTreeMap<YearMonth, BillingMonth>,
    /// Hourly household consumption weights used to spread billed energy.
    #[serde(default)]
    pub consumption_profile: ConsumptionProfile,
    #[serde(default)]
    pub investment: InvestmentConfig,
    #[serde(default)]
    pub finance: FinanceConfig,
}

/// Battery hardware parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Nameplate capacity (kWh).
    pub capacity_kwh: f64,
    /// Usable fraction of capacity (0.0–1.0).
    pub depth_of_discharge: f64,
    /// Maximum charging power (kW).
    pub charge_rate_kw: f64,
    /// Maximum discharging power (kW).
    pub discharge_rate_kw: f64,
    /// Round-trip efficiency (0.0–1.0).
    pub round_trip_efficiency: f64,
    pub efficiency_convention: EfficiencyConvention,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 28.8,
            depth_of_discharge: 0.95,
            charge_rate_kw: 4.3,
            discharge_rate_kw: 4.9,
            round_trip_efficiency: 0.96,
            efficiency_convention: EfficiencyConvention::Charge,
        }
    }
}

/// Simulation timing and policy parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Sampling interval of the readings (minutes, > 0).
    pub interval_minutes: u32,
    pub daylight_start_hour: u32,
    pub daylight_end_hour: u32,
    pub full_window_start_hour: u32,
    pub full_window_end_hour: u32,
    pub evening_start_hour: u32,
    /// Household draw served from the battery in the evening peak (W).
    pub household_draw_w: f64,
    /// Overnight top-up threshold as a fraction of usable capacity.
    pub topup_threshold: f64,
    /// "Full" threshold as a fraction of usable capacity.
    pub full_threshold: f64,
    /// Starting SOC fraction of the continuous policy.
    pub continuous_initial_soc: f64,
    /// Starting SOC fractions of the what-if scenarios.
    pub scenario_starting_soc: Vec<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            daylight_start_hour: 6,
            daylight_end_hour: 18,
            full_window_start_hour: 6,
            full_window_end_hour: 20,
            evening_start_hour: 18,
            household_draw_w: 2000.0,
            topup_threshold: 0.8,
            full_threshold: 0.95,
            continuous_initial_soc: 0.5,
            scenario_starting_soc: vec![0.0, 0.25, 0.5, 0.75],
        }
    }
}

/// Default tariff plus per-month overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffConfig {
    pub sponge: f64,
    pub peak: f64,
    pub off_peak: f64,
    pub feed_in: f64,
    pub supply_per_day: f64,
    /// Complete rate tables for individual months, keyed `"YYYY-M"`.
    pub monthly: BTreeMap<YearMonth, TariffRates>,
}

impl Default for TariffConfig {
    fn default() -> Self {
        let rates = TariffRates::default();
        Self {
            sponge: rates.sponge,
            peak: rates.peak,
            off_peak: rates.off_peak,
            feed_in: rates.feed_in,
            supply_per_day: rates.supply_per_day,
            monthly: BTreeMap::new(),
        }
    }
}

impl TariffConfig {
    pub fn rates(&self) -> TariffRates {
        TariffRates {
            sponge: self.sponge,
            peak: self.peak,
            off_peak: self.off_peak,
            feed_in: self.feed_in,
            supply_per_day: self.supply_per_day,
        }
    }
}

/// Daily free-charging window from a start date.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromotionConfig {
    /// First day of the promotion, `"YYYY-MM-DD"`.
    pub start_date: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap_or_default(),
            start_hour: 11,
            end_hour: 14,
        }
    }
}

/// Up-front cost of the installation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvestmentConfig {
    pub battery_cost: f64,
    pub rebate: f64,
}

impl Default for InvestmentConfig {
    fn default() -> Self {
        Self {
            battery_cost: 10_700.0,
            rebate: 1_500.0,
        }
    }
}

impl InvestmentConfig {
    pub fn net_investment(&self) -> f64 {
        self.battery_cost - self.rebate
    }
}

/// Financing options for the net investment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceConfig {
    /// Mortgage rate forgone when paying from an offset account (%).
    pub mortgage_rate_pct: f64,
    pub compare_offset: bool,
    pub lenders: Vec<LoanOption>,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            mortgage_rate_pct: 6.0,
            compare_offset: true,
            lenders: vec![
                LoanOption {
                    name: "Flat-fee plan".to_string(),
                    term_years: 5,
                    fee_amount: 2.30,
                    fee_frequency: PaymentFrequency::Weekly,
                    establishment_fee: 75.0,
                    ..LoanOption::default()
                },
                LoanOption {
                    name: "Bank loan".to_string(),
                    term_years: 5,
                    interest_rate_pct: 7.5,
                    establishment_fee: 250.0,
                    ..LoanOption::default()
                },
                LoanOption {
                    name: "Green loan".to_string(),
                    term_years: 7,
                    interest_rate_pct: 5.5,
                    enabled: false,
                    ..LoanOption::default()
                },
            ],
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl AnalysisConfig {
    /// The measured household: Alpha ESS 28.8 kWh battery, default tariff.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// A 10 kWh fully usable battery with the baseline rates.
    pub fn compact() -> Self {
        Self {
            battery: BatteryConfig {
                capacity_kwh: 10.0,
                depth_of_discharge: 1.0,
                ..BatteryConfig::default()
            },
            investment: InvestmentConfig {
                battery_cost: 6_500.0,
                ..InvestmentConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "compact"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "compact" => Ok(Self::compact()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Builds the battery. Call [`validate`](Self::validate) first.
    pub fn battery_spec(&self) -> BatterySpec {
        let b = &self.battery;
        BatterySpec::new(
            b.capacity_kwh,
            b.depth_of_discharge,
            b.charge_rate_kw,
            b.discharge_rate_kw,
            b.round_trip_efficiency,
        )
        .with_efficiency_convention(b.efficiency_convention)
    }

    pub fn sim_params(&self) -> SimParams {
        let s = &self.simulation;
        SimParams {
            daylight_start_hour: s.daylight_start_hour,
            daylight_end_hour: s.daylight_end_hour,
            full_window_start_hour: s.full_window_start_hour,
            full_window_end_hour: s.full_window_end_hour,
            evening_start_hour: s.evening_start_hour,
            household_draw_w: s.household_draw_w,
            topup_threshold: s.topup_threshold,
            full_threshold: s.full_threshold,
            ..SimParams::new(s.interval_minutes)
        }
    }

    pub fn tariff_schedule(&self) -> TariffSchedule {
        TariffSchedule {
            default: self.tariff.rates(),
            monthly: self.tariff.monthly.clone(),
        }
    }

    pub fn free_window(&self) -> Option<FreeChargeWindow> {
        self.promotion
            .as_ref()
            .map(|p| FreeChargeWindow::new(p.start_date, p.start_hour, p.end_hour))
    }

    /// The continuous policy followed by every configured scenario.
    pub fn policies(&self) -> Vec<Policy> {
        std::iter::once(Policy::Continuous {
            initial_soc: self.simulation.continuous_initial_soc,
        })
        .chain(
            self.simulation
                .scenario_starting_soc
                .iter()
                .map(|&starting_soc| Policy::Scenario { starting_soc }),
        )
        .collect()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let b = &self.battery;
        check(b.capacity_kwh > 0.0, "battery.capacity_kwh", "must be > 0");
        check(
            b.depth_of_discharge > 0.0 && b.depth_of_discharge <= 1.0,
            "battery.depth_of_discharge",
            "must be in (0.0, 1.0]",
        );
        check(b.charge_rate_kw >= 0.0, "battery.charge_rate_kw", "must be >= 0");
        check(b.discharge_rate_kw >= 0.0, "battery.discharge_rate_kw", "must be >= 0");
        check(
            b.round_trip_efficiency > 0.0 && b.round_trip_efficiency <= 1.0,
            "battery.round_trip_efficiency",
            "must be in (0.0, 1.0]",
        );

        let s = &self.simulation;
        check(s.interval_minutes > 0, "simulation.interval_minutes", "must be > 0");
        check(
            s.daylight_start_hour < s.daylight_end_hour && s.daylight_end_hour <= 24,
            "simulation.daylight_start_hour",
            "must be < simulation.daylight_end_hour <= 24",
        );
        check(
            s.full_window_start_hour < s.full_window_end_hour && s.full_window_end_hour <= 24,
            "simulation.full_window_start_hour",
            "must be < simulation.full_window_end_hour <= 24",
        );
        check(s.evening_start_hour < 24, "simulation.evening_start_hour", "must be < 24");
        check(s.household_draw_w >= 0.0, "simulation.household_draw_w", "must be >= 0");
        check(
            (0.0..=1.0).contains(&s.topup_threshold),
            "simulation.topup_threshold",
            "must be in [0.0, 1.0]",
        );
        check(
            s.full_threshold > 0.0 && s.full_threshold <= 1.0,
            "simulation.full_threshold",
            "must be in (0.0, 1.0]",
        );
        check(
            (0.0..=1.0).contains(&s.continuous_initial_soc),
            "simulation.continuous_initial_soc",
            "must be in [0.0, 1.0]",
        );
        check(
            s.scenario_starting_soc.iter().all(|f| (0.0..=1.0).contains(f)),
            "simulation.scenario_starting_soc",
            "every entry must be in [0.0, 1.0]",
        );

        let t = self.tariff.rates();
        let rates_ok = |r: &TariffRates| {
            [r.sponge, r.peak, r.off_peak, r.feed_in, r.supply_per_day]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0)
        };
        check(rates_ok(&t), "tariff", "rates must be finite and >= 0");
        check(
            self.tariff.monthly.values().all(rates_ok),
            "tariff.monthly",
            "rates must be finite and >= 0",
        );

        if let Some(p) = &self.promotion {
            check(
                p.start_hour < p.end_hour && p.end_hour <= 24,
                "promotion.start_hour",
                "must be < promotion.end_hour <= 24",
            );
        }

        check(
            self.billing
                .values()
                .all(|m| [m.sponge, m.peak, m.off_peak, m.feed_in].iter().all(|v| *v >= 0.0)),
            "billing",
            "billed energy must be >= 0",
        );
        check(
            self.consumption_profile.0.iter().all(|w| w.is_finite() && *w >= 0.0),
            "consumption_profile",
            "weights must be finite and >= 0",
        );
        check(
            self.investment.net_investment() >= 0.0,
            "investment.rebate",
            "must not exceed investment.battery_cost",
        );
        check(
            self.finance.lenders.iter().all(|l| l.term_years > 0),
            "finance.lenders.term_years",
            "must be > 0",
        );

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_valid() {
        for name in AnalysisConfig::PRESETS {
            let cfg = AnalysisConfig::from_preset(name);
            let errors = cfg.map(|c| c.validate()).unwrap_or_default();
            assert!(errors.is_empty(), "{name} should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = AnalysisConfig::from_preset("nonexistent");
        assert!(err.is_err_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn baseline_battery_matches_installed_unit() {
        let spec = AnalysisConfig::baseline().battery_spec();
        assert!((spec.usable_kwh - 27.36).abs() < 1e-9);
        assert_eq!(spec.charge_rate_kw, 4.3);
        assert_eq!(spec.discharge_rate_kw, 4.9);
    }

    #[test]
    fn default_policies() {
        let labels: Vec<String> = AnalysisConfig::baseline()
            .policies()
            .iter()
            .map(Policy::label)
            .collect();
        assert_eq!(
            labels,
            ["continuous", "scenario_0%", "scenario_25%", "scenario_50%", "scenario_75%"]
        );
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
consumption_profile = [1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 1, 1,
                       1, 1, 1, 1, 1, 2, 3, 3, 3, 2, 1, 1]

[battery]
capacity_kwh = 13.5
depth_of_discharge = 1.0
efficiency_convention = "both"

[simulation]
interval_minutes = 10
scenario_starting_soc = [0.0, 0.5]

[tariff]
peak = 0.60

[tariff.monthly."2025-7"]
sponge = 0.2
peak = 0.7
off_peak = 0.4
feed_in = 0.03
supply_per_day = 1.3

[promotion]
start_date = "2026-07-01"
start_hour = 11
end_hour = 14

[billing."2025-7"]
sponge = 28.75
peak = 657.57
off_peak = 269.27
feed_in = 218.55

[investment]
battery_cost = 9000

[finance]
mortgage_rate_pct = 5.8

[[finance.lenders]]
name = "Credit union"
term_years = 3
interest_rate_pct = 6.9
fee_frequency = "fortnightly"
"#;
        let cfg = AnalysisConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let Ok(cfg) = cfg else { return };
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.battery.efficiency_convention, EfficiencyConvention::Both);
        assert_eq!(cfg.sim_params().interval.num_minutes(), 10);
        assert_eq!(cfg.tariff.peak, 0.60);
        assert_eq!(cfg.tariff.sponge, 0.2701);
        let july = YearMonth::new(2025, 7);
        assert_eq!(cfg.tariff_schedule().rates_for(july).peak, 0.7);
        assert_eq!(cfg.tariff_schedule().rates_for(YearMonth::new(2025, 8)).peak, 0.60);
        assert_eq!(cfg.billing.get(&july).map(|b| b.peak), Some(657.57));
        assert!(cfg.free_window().is_some());
        assert_eq!(cfg.policies().len(), 3);
        assert_eq!(cfg.finance.lenders.len(), 1);
        assert_eq!(cfg.finance.lenders[0].fee_frequency, PaymentFrequency::Fortnightly);
        assert!(cfg.finance.lenders[0].enabled);
        assert_eq!(cfg.consumption_profile.weight(19), 3.0);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[battery]
capacity_kwh = 10.0
bogus_field = true
"#;
        assert!(AnalysisConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn invalid_billing_key() {
        let toml = r#"
[billing.July]
peak = 1.0
"#;
        assert!(AnalysisConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_bad_battery() {
        let mut cfg = AnalysisConfig::baseline();
        cfg.battery.depth_of_discharge = 1.5;
        cfg.battery.round_trip_efficiency = 0.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.depth_of_discharge"));
        assert!(errors.iter().any(|e| e.field == "battery.round_trip_efficiency"));
    }

    #[test]
    fn validation_catches_zero_interval() {
        let mut cfg = AnalysisConfig::baseline();
        cfg.simulation.interval_minutes = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.interval_minutes"));
    }

    #[test]
    fn validation_catches_empty_promotion_window() {
        let mut cfg = AnalysisConfig::baseline();
        cfg.promotion = Some(PromotionConfig {
            start_hour: 14,
            end_hour: 11,
            ..PromotionConfig::default()
        });
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "promotion.start_hour"));
    }

    #[test]
    fn validation_catches_bad_scenario_soc() {
        let mut cfg = AnalysisConfig::baseline();
        cfg.simulation.scenario_starting_soc = vec![0.5, 1.2];
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.scenario_starting_soc"));
    }
}
