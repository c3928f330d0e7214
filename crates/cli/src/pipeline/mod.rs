//! Session orchestration module.

mod session;
mod simulation;
mod stats;

pub use session::{ReplaySession, SessionConfig};
pub use simulation::{run_simulation, SimulationConfig, SimulationReport};
pub use stats::SessionStats;
