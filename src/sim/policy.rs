//! Simulation policies: what-if scenarios and continuous day-to-day operation.

use std::fmt;

use serde::Serialize;

/// How the engine drives the battery across days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Policy {
    /// Every day restarts at `starting_soc` × usable capacity and only charges
    /// from solar; consumption is ignored and the battery never discharges.
    Scenario { starting_soc: f64 },
    /// SOC carries over between days; the battery charges from solar surplus,
    /// serves the evening peak, and tops up overnight from the grid.
    Continuous { initial_soc: f64 },
}

impl Policy {
    /// Scenario policy starting each day at `percent` % of usable capacity.
    pub fn scenario_percent(percent: f64) -> Self {
        Self::Scenario {
            starting_soc: percent / 100.0,
        }
    }

    /// Fraction of usable capacity the first simulated day starts at.
    pub const fn starting_fraction(&self) -> f64 {
        match *self {
            Self::Scenario { starting_soc } => starting_soc,
            Self::Continuous { initial_soc } => initial_soc,
        }
    }

    /// Whether SOC is reset at every day boundary.
    pub const fn resets_daily(&self) -> bool {
        matches!(self, Self::Scenario { .. })
    }

    /// Short stable label, e.g. `continuous` or `scenario_25%`.
    pub fn label(&self) -> String {
        match self {
            Self::Scenario { starting_soc } => format!("scenario_{:.0}%", starting_soc * 100.0),
            Self::Continuous { .. } => "continuous".to_string(),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scenario { starting_soc } => {
                write!(f, "Scenario (start at {:.0}%)", starting_soc * 100.0)
            }
            Self::Continuous { initial_soc } => {
                write!(f, "Continuous (initial {:.0}%)", initial_soc * 100.0)
            }
        }
    }
}
