//! Battery simulation engine: a left fold of readings into SOC transitions.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{debug, warn};

use crate::battery::{BatterySpec, Transfer};
use crate::error::SimError;
use crate::reading::{DayBatch, Reading};
use crate::tariff::{FreeChargeWindow, RatePeriod};

use super::day::DayAccumulator;
use super::policy::Policy;
use super::types::{DailyResult, SimParams, StepMode, StepResult};

/// Mutable battery state threaded through the fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    /// Stored energy, always within `[0, usable_kwh]`.
    pub soc_kwh: f64,
    /// Day currently being simulated.
    pub date: NaiveDate,
    /// First timestamp of the day at which the battery counted as full.
    pub time_to_full: Option<NaiveDateTime>,
}

/// Output of one policy run over a sequence of day batches.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    pub policy: Policy,
    #[serde(skip)]
    pub steps: Vec<StepResult>,
    pub daily: Vec<DailyResult>,
}

/// Simulation engine borrowing the immutable battery and timing configuration.
///
/// The engine holds no state of its own, so one instance can run any number
/// of policies, sequentially or from several threads.
#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    spec: &'a BatterySpec,
    params: &'a SimParams,
    free_window: Option<&'a FreeChargeWindow>,
}

impl<'a> Engine<'a> {
    pub fn new(spec: &'a BatterySpec, params: &'a SimParams) -> Self {
        Self {
            spec,
            params,
            free_window: None,
        }
    }

    /// Enables the free-charging promotion for the continuous policy.
    #[must_use]
    pub fn with_free_window(mut self, window: Option<&'a FreeChargeWindow>) -> Self {
        self.free_window = window;
        self
    }

    pub fn spec(&self) -> &BatterySpec {
        self.spec
    }

    pub fn params(&self) -> &SimParams {
        self.params
    }

    pub fn free_window(&self) -> Option<&FreeChargeWindow> {
        self.free_window
    }

    /// Runs `policy` over ordered day batches.
    ///
    /// Empty batches produce no [`DailyResult`].
    ///
    /// # Errors
    ///
    /// Returns a [`SimError`] if a batch is out of order or contains readings
    /// from another day. Irregular spacing is only logged.
    pub fn run(&self, policy: Policy, days: &[DayBatch]) -> Result<SimulationRun, SimError> {
        let initial_soc = self
            .spec
            .clamp_soc(self.spec.usable_kwh * policy.starting_fraction());
        let mut soc_kwh = initial_soc;
        let mut steps = Vec::with_capacity(days.iter().map(|d| d.readings.len()).sum());
        let mut daily = Vec::with_capacity(days.len());
        let mut last_timestamp: Option<NaiveDateTime> = None;

        for day in days.iter().filter(|d| !d.is_empty()) {
            let first = day.readings[0].timestamp;
            if let Some(previous) = last_timestamp.filter(|p| *p >= first) {
                return Err(SimError::OutOfOrder {
                    previous,
                    at: first,
                });
            }
            let spacing = day.validate_spacing(self.params.interval)?;
            if spacing.gaps > 0 {
                warn!(date = %day.date, gaps = spacing.gaps, "day has missing samples");
            }
            if spacing.early > 0 {
                warn!(date = %day.date, early = spacing.early, "day has samples closer than the interval");
            }

            if policy.resets_daily() {
                soc_kwh = initial_soc;
            }

            let mut state = SimulationState {
                soc_kwh,
                date: day.date,
                time_to_full: None,
            };
            let mut acc = DayAccumulator::new(day.date, soc_kwh);
            for reading in &day.readings {
                let (next, step) = self.step(&policy, state, reading);
                acc.record(&step);
                steps.push(step);
                state = next;
            }

            daily.push(acc.finish(state.soc_kwh, self.spec.usable_kwh, state.time_to_full));
            soc_kwh = state.soc_kwh;
            last_timestamp = day.readings.last().map(|r| r.timestamp);
        }

        debug!(
            policy = %policy.label(),
            n_days = daily.len(),
            n_steps = steps.len(),
            "simulation finished"
        );
        Ok(SimulationRun {
            policy,
            steps,
            daily,
        })
    }

    /// Advances the state by one reading.
    pub fn step(
        &self,
        policy: &Policy,
        state: SimulationState,
        reading: &Reading,
    ) -> (SimulationState, StepResult) {
        match policy {
            Policy::Scenario { .. } => self.scenario_step(state, reading),
            Policy::Continuous { .. } => self.continuous_step(state, reading),
        }
    }

    fn scenario_step(
        &self,
        state: SimulationState,
        reading: &Reading,
    ) -> (SimulationState, StepResult) {
        let dt = self.params.dt_hours;
        let solar_kwh = self.params.energy_kwh(reading.solar_power_w);

        let transfer = self.spec.charge(state.soc_kwh, reading.solar_power_w, dt);
        let soc_kwh = self.spec.clamp_soc(state.soc_kwh + transfer.soc_delta_kwh);
        let charge_kwh = soc_kwh - state.soc_kwh;

        let next = SimulationState {
            soc_kwh,
            date: state.date,
            time_to_full: state.time_to_full.or_else(|| {
                (soc_kwh >= self.spec.threshold_kwh(self.params.full_threshold))
                    .then_some(reading.timestamp)
            }),
        };
        let step = StepResult {
            timestamp: reading.timestamp,
            rate_period: reading.rate_period,
            mode: if charge_kwh > 0.0 {
                StepMode::Charging
            } else {
                StepMode::Idle
            },
            solar_kwh,
            consumption_kwh: 0.0,
            charge_kwh,
            discharge_kwh: 0.0,
            grid_import_kwh: 0.0,
            grid_export_kwh: (solar_kwh - transfer.external_kwh).max(0.0),
            free_charge_kwh: 0.0,
            soc_kwh,
        };
        (next, step)
    }

    fn continuous_step(
        &self,
        state: SimulationState,
        reading: &Reading,
    ) -> (SimulationState, StepResult) {
        let p = self.params;
        let dt = p.dt_hours;
        let hour = reading.timestamp.hour();
        let soc = state.soc_kwh;
        let grid_charge_w = self.spec.charge_rate_kw * 1000.0;

        let solar_kwh = p.energy_kwh(reading.solar_power_w);
        let consumption_kwh = p.energy_kwh(reading.consumption_power_w);
        let surplus_w = (reading.solar_power_w - reading.consumption_power_w).max(0.0);
        let surplus_kwh = p.energy_kwh(surplus_w);
        let deficit_kwh = (consumption_kwh - solar_kwh).max(0.0);

        let mut import_kwh = deficit_kwh;
        let mut export_kwh = surplus_kwh;
        let mut free_kwh = 0.0;

        let (mode, transfer, charging) = if p.is_daylight(hour) && surplus_w > 0.0 {
            let t = self.spec.charge(soc, surplus_w, dt);
            export_kwh = (surplus_kwh - t.external_kwh).max(0.0);
            (StepMode::Charging, t, true)
        } else if reading.rate_period == RatePeriod::Peak && hour >= p.evening_start_hour {
            // A measured load caps the draw; without one the assumed draw is served.
            let draw_w = if reading.consumption_power_w > 0.0 {
                let deficit_w = (reading.consumption_power_w - reading.solar_power_w).max(0.0);
                p.household_draw_w.min(deficit_w)
            } else {
                p.household_draw_w
            };
            let t = self.spec.discharge(soc, draw_w, dt);
            import_kwh = (deficit_kwh - t.external_kwh).max(0.0);
            export_kwh += (t.external_kwh - deficit_kwh).max(0.0);
            (StepMode::Discharging, t, false)
        } else if self.free_window_active(reading.timestamp) && soc < self.spec.usable_kwh {
            let t = self.spec.charge(soc, grid_charge_w, dt);
            free_kwh = t.external_kwh;
            (StepMode::GridTopping, t, true)
        } else if reading.rate_period == RatePeriod::OffPeak
            && soc < self.spec.threshold_kwh(p.topup_threshold)
        {
            let t = self.spec.charge(soc, grid_charge_w, dt);
            import_kwh += t.external_kwh;
            (StepMode::GridTopping, t, true)
        } else {
            (StepMode::Idle, Transfer::default(), false)
        };

        let soc_kwh = if charging {
            self.spec.clamp_soc(soc + transfer.soc_delta_kwh)
        } else {
            self.spec.clamp_soc(soc - transfer.soc_delta_kwh)
        };
        let (charge_kwh, discharge_kwh) = if charging {
            (soc_kwh - soc, 0.0)
        } else {
            (0.0, soc - soc_kwh)
        };

        let next = SimulationState {
            soc_kwh,
            date: state.date,
            time_to_full: state.time_to_full.or_else(|| {
                (soc_kwh >= self.spec.threshold_kwh(p.full_threshold) && p.in_full_window(hour))
                    .then_some(reading.timestamp)
            }),
        };
        let step = StepResult {
            timestamp: reading.timestamp,
            rate_period: reading.rate_period,
            mode,
            solar_kwh,
            consumption_kwh,
            charge_kwh,
            discharge_kwh,
            grid_import_kwh: import_kwh,
            grid_export_kwh: export_kwh,
            free_charge_kwh: free_kwh,
            soc_kwh,
        };
        (next, step)
    }

    fn free_window_active(&self, timestamp: NaiveDateTime) -> bool {
        self.free_window.is_some_and(|w| w.is_active(timestamp))
    }
}
