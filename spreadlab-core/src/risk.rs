//! Portfolio-level risk checks on candidate signals.
//!
//! The risk manager only accepts or rejects. It never resizes or reprices a
//! signal, and a rejection is an expected outcome rather than an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ensure_fraction, ConfigError};
use crate::domain::{PortfolioState, Signal};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    pub max_positions: usize,
    /// Largest capital requirement allowed for one position, as a fraction of equity.
    pub max_allocation_fraction: f64,
    pub min_entry_dte: i64,
    pub max_entry_dte: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_positions: 10,
            max_allocation_fraction: 0.10,
            min_entry_dte: 21,
            max_entry_dte: 60,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_fraction("risk.max_allocation_fraction", self.max_allocation_fraction)?;
        if self.min_entry_dte > self.max_entry_dte {
            return Err(ConfigError::Invalid {
                field: "risk.min_entry_dte",
                reason: format!(
                    "entry window [{}, {}] is empty",
                    self.min_entry_dte, self.max_entry_dte
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskRejection {
    MaxPositions { open: usize, max: usize },
    AllocationExceeded { required: f64, limit: f64 },
    InsufficientBuyingPower { required: f64, available: f64 },
    DteOutsideWindow { dte: Option<i64>, min: i64, max: i64 },
}

impl fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxPositions { open, max } => {
                write!(f, "{open} open positions (max {max})")
            }
            Self::AllocationExceeded { required, limit } => {
                write!(f, "capital {required:.2} exceeds allocation limit {limit:.2}")
            }
            Self::InsufficientBuyingPower { required, available } => {
                write!(f, "capital {required:.2} exceeds buying power {available:.2}")
            }
            Self::DteOutsideWindow { dte: Some(dte), min, max } => {
                write!(f, "DTE {dte} outside entry window [{min}, {max}]")
            }
            Self::DteOutsideWindow { dte: None, min, max } => {
                write!(f, "no expiration to check against entry window [{min}, {max}]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Accept,
    Reject(RiskRejection),
}

impl RiskDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    limits: RiskLimits,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Checks run in order: position count, allocation, buying power, DTE window.
    pub fn evaluate(&self, signal: &Signal, portfolio: &PortfolioState) -> RiskDecision {
        let l = &self.limits;
        if portfolio.open_positions >= l.max_positions {
            return RiskDecision::Reject(RiskRejection::MaxPositions {
                open: portfolio.open_positions,
                max: l.max_positions,
            });
        }

        let required = signal.capital_requirement();
        let limit = l.max_allocation_fraction * portfolio.equity.max(0.0);
        if required > limit {
            return RiskDecision::Reject(RiskRejection::AllocationExceeded { required, limit });
        }
        if portfolio.buying_power - required < 0.0 {
            return RiskDecision::Reject(RiskRejection::InsufficientBuyingPower {
                required,
                available: portfolio.buying_power,
            });
        }

        match signal.aggregate_dte() {
            Some(dte) if dte >= l.min_entry_dte && dte <= l.max_entry_dte => RiskDecision::Accept,
            dte => RiskDecision::Reject(RiskRejection::DteOutsideWindow {
                dte,
                min: l.min_entry_dte,
                max: l.max_entry_dte,
            }),
        }
    }
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new(RiskLimits::default())
    }
}
