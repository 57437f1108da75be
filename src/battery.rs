//! Battery specification and the clamped energy-transfer primitives used by the engine.

use serde::{Deserialize, Serialize};

/// Where the round-trip efficiency loss is booked.
///
/// - `Charge`: energy stored is multiplied by η once; discharge removes exactly
///   the energy delivered.
/// - `Both`: energy stored is multiplied by η and discharge removes the
///   delivered energy divided by η.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyConvention {
    #[default]
    Charge,
    Both,
}

/// Immutable description of a home battery.
///
/// Only the usable fraction of the nameplate capacity (`capacity_kwh × DoD`)
/// is available to the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatterySpec {
    /// Nameplate capacity in kilowatt-hours.
    pub capacity_kwh: f64,
    /// Depth-of-discharge factor (0..=1.0).
    pub depth_of_discharge: f64,
    /// Usable capacity, `capacity_kwh × depth_of_discharge`.
    pub usable_kwh: f64,
    /// Maximum charging power in kilowatts.
    pub charge_rate_kw: f64,
    /// Maximum discharging power in kilowatts.
    pub discharge_rate_kw: f64,
    /// Round-trip efficiency (0..=1.0).
    pub round_trip_efficiency: f64,
    /// How the efficiency loss is applied.
    pub efficiency_convention: EfficiencyConvention,
}

/// Result of one clamped transfer: the energy seen outside the battery and the
/// change it made to the state of charge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transfer {
    /// Energy drawn from the source (charge) or delivered to the load (discharge), kWh.
    pub external_kwh: f64,
    /// Magnitude of the SOC change, kWh.
    pub soc_delta_kwh: f64,
}

impl BatterySpec {
    /// Creates a battery specification.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Nameplate capacity (must be > 0)
    /// * `depth_of_discharge` - Usable fraction of capacity (0..=1.0, > 0)
    /// * `charge_rate_kw` - Maximum charge power (>= 0)
    /// * `discharge_rate_kw` - Maximum discharge power (>= 0)
    /// * `round_trip_efficiency` - Efficiency (0..=1.0, > 0)
    ///
    /// # Panics
    ///
    /// Panics if any argument is outside its range.
    pub fn new(
        capacity_kwh: f64,
        depth_of_discharge: f64,
        charge_rate_kw: f64,
        discharge_rate_kw: f64,
        round_trip_efficiency: f64,
    ) -> Self {
        assert!(capacity_kwh > 0.0);
        assert!(depth_of_discharge > 0.0 && depth_of_discharge <= 1.0);
        assert!(charge_rate_kw >= 0.0 && discharge_rate_kw >= 0.0);
        assert!(round_trip_efficiency > 0.0 && round_trip_efficiency <= 1.0);

        Self {
            capacity_kwh,
            depth_of_discharge,
            usable_kwh: capacity_kwh * depth_of_discharge,
            charge_rate_kw,
            discharge_rate_kw,
            round_trip_efficiency,
            efficiency_convention: EfficiencyConvention::Charge,
        }
    }

    #[must_use]
    pub fn with_efficiency_convention(mut self, convention: EfficiencyConvention) -> Self {
        self.efficiency_convention = convention;
        self
    }

    /// SOC (kWh) at which the battery counts as full for the given fraction.
    pub fn threshold_kwh(&self, fraction: f64) -> f64 {
        self.usable_kwh * fraction
    }

    /// Charges from a source offering `power_w` for `dt_hours`.
    ///
    /// Power is capped at the charge rate, the stored energy is reduced by the
    /// round-trip efficiency, and anything beyond the remaining headroom is
    /// silently dropped.
    pub fn charge(&self, soc_kwh: f64, power_w: f64, dt_hours: f64) -> Transfer {
        let power_w = power_w.min(self.charge_rate_kw * 1000.0).max(0.0);
        let requested_kwh = power_w * dt_hours / 1000.0 * self.round_trip_efficiency;
        let headroom_kwh = (self.usable_kwh - soc_kwh).max(0.0);
        let stored_kwh = requested_kwh.min(headroom_kwh);

        Transfer {
            external_kwh: stored_kwh / self.round_trip_efficiency,
            soc_delta_kwh: stored_kwh,
        }
    }

    /// Discharges to a load drawing `power_w` for `dt_hours`.
    ///
    /// Power is capped at the discharge rate and the removal is floored at an
    /// empty battery.
    pub fn discharge(&self, soc_kwh: f64, power_w: f64, dt_hours: f64) -> Transfer {
        let power_w = power_w.min(self.discharge_rate_kw * 1000.0).max(0.0);
        let loss_factor = match self.efficiency_convention {
            EfficiencyConvention::Charge => 1.0,
            EfficiencyConvention::Both => 1.0 / self.round_trip_efficiency,
        };
        let requested_kwh = power_w * dt_hours / 1000.0 * loss_factor;
        let removed_kwh = requested_kwh.min(soc_kwh.max(0.0));

        Transfer {
            external_kwh: removed_kwh / loss_factor,
            soc_delta_kwh: removed_kwh,
        }
    }

    /// Clamps a state of charge into `[0, usable_kwh]`.
    pub fn clamp_soc(&self, soc_kwh: f64) -> f64 {
        soc_kwh.clamp(0.0, self.usable_kwh)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    const DT: f64 = 1.0 / 12.0;

    fn spec() -> BatterySpec {
        BatterySpec::new(28.8, 0.95, 4.3, 4.9, 0.96)
    }

    #[test]
    fn usable_is_capacity_times_dod() {
        let s = spec();
        assert_abs_diff_eq!(s.usable_kwh, 27.36, epsilon = 1e-9);
        assert!(s.usable_kwh <= s.capacity_kwh);
    }

    #[test]
    #[should_panic]
    fn invalid_capacity() {
        BatterySpec::new(0.0, 0.95, 4.3, 4.9, 0.96);
    }

    #[test]
    #[should_panic]
    fn invalid_efficiency() {
        BatterySpec::new(10.0, 1.0, 4.3, 4.9, 1.2);
    }

    #[test]
    #[should_panic]
    fn invalid_dod() {
        BatterySpec::new(10.0, 0.0, 4.3, 4.9, 0.9);
    }

    #[test]
    fn charge_power_limit() {
        // 10 kW offered, capped to 4.3 kW for 5 minutes at 96%
        let t = spec().charge(0.0, 10_000.0, DT);
        assert_abs_diff_eq!(t.soc_delta_kwh, 4.3 * DT * 0.96, epsilon = 1e-12);
        assert_abs_diff_eq!(t.external_kwh, 4.3 * DT, epsilon = 1e-12);
    }

    #[test]
    fn charge_headroom_limit() {
        let s = spec();
        let t = s.charge(s.usable_kwh - 0.1, 4300.0, DT);
        assert_abs_diff_eq!(t.soc_delta_kwh, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(t.external_kwh, 0.1 / 0.96, epsilon = 1e-12);
    }

    #[test]
    fn charge_when_full_is_noop() {
        let s = spec();
        let t = s.charge(s.usable_kwh, 4300.0, DT);
        assert_eq!(t, Transfer::default());
    }

    #[test]
    fn negative_power_is_ignored() {
        let s = spec();
        assert_eq!(s.charge(5.0, -500.0, DT).soc_delta_kwh, 0.0);
        assert_eq!(s.discharge(5.0, -500.0, DT).soc_delta_kwh, 0.0);
    }

    #[test]
    fn discharge_power_limit() {
        let t = spec().discharge(10.0, 20_000.0, 1.0);
        assert_abs_diff_eq!(t.external_kwh, 4.9, epsilon = 1e-12);
        assert_abs_diff_eq!(t.soc_delta_kwh, 4.9, epsilon = 1e-12);
    }

    #[test]
    fn discharge_floors_at_empty() {
        let t = spec().discharge(0.05, 2000.0, DT);
        assert_abs_diff_eq!(t.soc_delta_kwh, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(t.external_kwh, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn discharge_with_both_convention_divides_by_efficiency() {
        let s = spec().with_efficiency_convention(EfficiencyConvention::Both);
        let t = s.discharge(10.0, 2000.0, DT);
        let delivered = 2.0 * DT;
        assert_abs_diff_eq!(t.external_kwh, delivered, epsilon = 1e-12);
        assert_abs_diff_eq!(t.soc_delta_kwh, delivered / 0.96, epsilon = 1e-12);
    }

    #[test]
    fn complete_cycle_loses_round_trip_once() {
        let s = BatterySpec::new(10.0, 1.0, 2.0, 2.0, 0.9);
        let mut soc = 0.0;
        let mut drawn = 0.0;
        while soc < s.usable_kwh - 1e-9 {
            let t = s.charge(soc, 2000.0, 1.0);
            soc += t.soc_delta_kwh;
            drawn += t.external_kwh;
        }
        let mut delivered = 0.0;
        while soc > 1e-9 {
            let t = s.discharge(soc, 2000.0, 1.0);
            soc -= t.soc_delta_kwh;
            delivered += t.external_kwh;
        }
        assert_abs_diff_eq!(delivered / drawn, 0.9, epsilon = 1e-9);
    }

    #[test]
    fn clamp_soc_bounds() {
        let s = spec();
        assert_eq!(s.clamp_soc(-1.0), 0.0);
        assert_eq!(s.clamp_soc(100.0), s.usable_kwh);
        assert_eq!(s.clamp_soc(3.0), 3.0);
    }
}
