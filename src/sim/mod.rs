pub(crate) mod day;
/// Battery simulation engine (pure fold over readings).
pub mod engine;
pub mod policy;
/// Aggregate statistics over daily results.
pub mod summary;
pub mod types;

pub use engine::{Engine, SimulationRun, SimulationState};
pub use policy::Policy;
pub use summary::{Season, SeasonalStats, SummaryStats};
pub use types::{DailyResult, SimParams, StepMode, StepResult};
