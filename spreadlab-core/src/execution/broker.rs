//! Live order routing.
//!
//! In live mode the coordinator hands executed legs to a `Brokerage` instead
//! of drawing against the fill model. Concrete brokerage adapters live outside
//! this crate.

use thiserror::Error;

use crate::domain::Leg;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error("order rejected by broker: {0}")]
    Rejected(String),

    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("order submission timed out")]
    Timeout,
}

/// Order-execution collaborator.
pub trait Brokerage: Send {
    /// Submit all legs as one order. Returns the broker's order ID.
    fn submit_order(&mut self, legs: &[Leg]) -> Result<String, BrokerError>;
}

/// How the coordinator turns an accepted signal into a fill.
pub enum ExecutionMode {
    /// Simulated fills drawn against the fill probability model.
    Backtest,
    /// Orders routed to a brokerage on the executed transition.
    Live(Box<dyn Brokerage>),
}

impl ExecutionMode {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

impl std::fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backtest => f.write_str("Backtest"),
            Self::Live(_) => f.write_str("Live"),
        }
    }
}
