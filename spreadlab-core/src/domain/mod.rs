//! Domain types for spreadlab

pub mod ids;
pub mod option;
pub mod portfolio;
pub mod position;
pub mod records;
pub mod signal;

pub use ids::{IdGen, PositionId, RunId, SignalId};
pub use option::{OptionChain, OptionContract, OptionQuote, OptionRight, CONTRACT_MULTIPLIER};
pub use portfolio::PortfolioState;
pub use position::{ExitReason, Position, PositionLeg, PositionStatus};
pub use records::{GapEvent, GapTrigger, RejectionReason, RejectionRecord, RejectionStage};
pub use signal::{Leg, Side, Signal, SignalError, SignalKind};
