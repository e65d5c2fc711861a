//! Append-only outcome records: rejections and gap events.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{PositionId, SignalId};

/// Why a signal or exit order did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Open interest below the liquidity floor.
    Liquidity,
    /// Bid-ask spread too wide and the fill draw failed.
    Spread,
    /// The probabilistic fill draw failed.
    FillProbability,
    /// A portfolio risk limit was hit.
    RiskLimit,
    /// Malformed legs.
    InvalidSignal,
    /// Live order submission failed.
    Broker,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Liquidity => "liquidity",
            Self::Spread => "spread",
            Self::FillProbability => "fill_probability",
            Self::RiskLimit => "risk_limit",
            Self::InvalidSignal => "invalid_signal",
            Self::Broker => "broker",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage at which a rejection happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    Generated,
    RiskChecked,
    FillEvaluated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub signal_id: Option<SignalId>,
    pub position_id: Option<PositionId>,
    pub symbol: String,
    /// OCC symbol of the failing leg, when a single leg caused the rejection.
    pub leg: Option<String>,
    pub reason: RejectionReason,
    pub stage: RejectionStage,
    pub detail: String,
    pub is_closing: bool,
    pub timestamp: NaiveDateTime,
}

/// What kind of market-closed interval produced a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapTrigger {
    Overnight,
    Weekend,
    Earnings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapEvent {
    pub position_id: PositionId,
    pub symbol: String,
    pub trigger: GapTrigger,
    /// Gap size as a fraction of the underlying price.
    pub gap_fraction: f64,
    /// Signed underlying move in price units (adverse to the position).
    pub gap_move: f64,
    /// Extra cost fraction added to the pending stop-loss exit.
    pub extra_slippage: f64,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_labels_are_stable() {
        assert_eq!(RejectionReason::Liquidity.to_string(), "liquidity");
        assert_eq!(RejectionReason::FillProbability.as_str(), "fill_probability");
        let json = serde_json::to_string(&RejectionReason::RiskLimit).unwrap();
        assert_eq!(json, "\"risk_limit\"");
    }
}
