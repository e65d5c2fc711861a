//! Simulation engine: timestamp loop, position management and run state.
//!
//! The loop consumes chain snapshots and close history from a data source,
//! drives the signal pipeline and execution coordinator, and applies gap risk
//! across closed-market intervals. Runs are strictly sequential in time.

pub mod loop_runner;
pub mod position_manager;
pub mod state;

pub use loop_runner::{Simulation, SimulationError};
pub use position_manager::{ExitRules, ExitSignal, PositionManager};
pub use state::{EngineState, RunResult};
