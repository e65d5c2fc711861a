//! Exit rules for open spreads.
//!
//! Checked in order at every timestamp with a fresh mark:
//! 1. Expired (DTE ≤ 0) → settle at intrinsic now.
//! 2. Loss ≥ `stop_loss_fraction` of the entry credit → stop loss.
//! 3. Profit ≥ `profit_target_fraction` of the entry credit → profit target.
//! 4. DTE ≤ `time_exit_dte` → time exit.
//!
//! Rules 2-4 only flag the exit; the order goes out at the next timestamp.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{ensure_non_negative, ConfigError};
use crate::domain::{ExitReason, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    pub profit_target_fraction: f64,
    pub stop_loss_fraction: f64,
    /// Close when DTE falls to this value. Zero disables the time exit.
    pub time_exit_dte: i64,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            profit_target_fraction: 0.50,
            stop_loss_fraction: 1.25,
            time_exit_dte: 21,
        }
    }
}

impl ExitRules {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("exits.profit_target_fraction", self.profit_target_fraction)?;
        ensure_non_negative("exits.stop_loss_fraction", self.stop_loss_fraction)?;
        if self.time_exit_dte < 0 {
            return Err(ConfigError::Invalid {
                field: "exits.time_exit_dte",
                reason: format!("{} is negative", self.time_exit_dte),
            });
        }
        Ok(())
    }
}

/// What the position manager decided for one position at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Hold,
    /// Expired: settle immediately, no order.
    Settle,
    /// Flag an exit order for the next timestamp.
    Exit(ExitReason),
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    rules: ExitRules,
}

impl PositionManager {
    pub fn new(rules: ExitRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    pub fn evaluate(&self, position: &Position, as_of: NaiveDateTime) -> ExitSignal {
        let dte = position.days_to_expiration(as_of.date()).unwrap_or(0);
        if dte <= 0 {
            return ExitSignal::Settle;
        }
        if position.loss_fraction() >= self.rules.stop_loss_fraction {
            return ExitSignal::Exit(ExitReason::StopLoss);
        }
        if position.profit_fraction() >= self.rules.profit_target_fraction {
            return ExitSignal::Exit(ExitReason::ProfitTarget);
        }
        if self.rules.time_exit_dte > 0 && dte <= self.rules.time_exit_dte {
            return ExitSignal::Exit(ExitReason::TimeExit);
        }
        ExitSignal::Hold
    }

    /// Evaluate and record the decision on the position. Stop breaches are
    /// timestamped the first time they are seen and replace any other pending
    /// exit reason. Returns the decision.
    pub fn update(&self, position: &mut Position, as_of: NaiveDateTime) -> ExitSignal {
        let signal = self.evaluate(position, as_of);
        if let ExitSignal::Exit(reason) = signal {
            if reason == ExitReason::StopLoss && position.stop_breached_at.is_none() {
                position.stop_breached_at = Some(as_of);
            }
            if reason == ExitReason::StopLoss {
                position.pending_exit = Some(reason);
            } else {
                position.pending_exit.get_or_insert(reason);
            }
        }
        signal
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new(ExitRules::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Leg, OptionContract, OptionRight, PositionId, Side, Signal, SignalId, SignalKind,
    };
    use chrono::{Duration, NaiveDate};

    fn at(days: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + Duration::days(days)
    }

    fn position() -> Position {
        let leg = |strike: f64, side: Side, mid: f64| Leg {
            contract: OptionContract::new("SPY", at(35).date(), strike, OptionRight::Put),
            side,
            quantity: 1,
            bid: mid,
            ask: mid,
            open_interest: 1000,
            avg_daily_volume: None,
            implied_volatility: 0.2,
            delta: -0.2,
        };
        let signal = Signal {
            id: SignalId(1),
            symbol: "SPY".into(),
            strategy: "test".into(),
            kind: SignalKind::CreditPutSpread,
            legs: vec![leg(400.0, Side::Sell, 2.0), leg(395.0, Side::Buy, 1.0)],
            target_premium: 0.5,
            generated_at: at(0),
        };
        Position::from_signal(PositionId(1), &signal, 1.0, 410.0, at(0), 0.0, None)
    }

    #[test]
    fn holds_fresh_position() {
        assert_eq!(PositionManager::default().evaluate(&position(), at(0)), ExitSignal::Hold);
    }

    #[test]
    fn stop_loss_at_125_percent() {
        let mut pos = position();
        pos.mark_premium = 2.25;
        let pm = PositionManager::default();
        assert_eq!(pm.update(&mut pos, at(1)), ExitSignal::Exit(ExitReason::StopLoss));
        assert_eq!(pos.stop_breached_at, Some(at(1)));
        assert_eq!(pos.pending_exit, Some(ExitReason::StopLoss));
        // first breach timestamp is kept
        pm.update(&mut pos, at(2));
        assert_eq!(pos.stop_breached_at, Some(at(1)));
    }

    #[test]
    fn stop_breach_replaces_pending_profit_target() {
        let mut pos = position();
        let pm = PositionManager::default();
        pos.mark_premium = 0.5;
        pm.update(&mut pos, at(1));
        assert_eq!(pos.pending_exit, Some(ExitReason::ProfitTarget));

        // closing order rejected, then the spread moves through the stop
        pos.mark_premium = 2.5;
        assert_eq!(pm.update(&mut pos, at(2)), ExitSignal::Exit(ExitReason::StopLoss));
        assert_eq!(pos.pending_exit, Some(ExitReason::StopLoss));
        assert_eq!(pos.stop_breached_at, Some(at(2)));
    }

    #[test]
    fn pending_time_exit_kept_while_stop_holds() {
        let mut pos = position();
        let pm = PositionManager::default();
        pm.update(&mut pos, at(14));
        assert_eq!(pos.pending_exit, Some(ExitReason::TimeExit));
        pos.mark_premium = 0.5;
        pm.update(&mut pos, at(15));
        assert_eq!(pos.pending_exit, Some(ExitReason::TimeExit));
    }

    #[test]
    fn stop_takes_precedence_over_time_exit() {
        let mut pos = position();
        pos.mark_premium = 3.0;
        assert_eq!(
            PositionManager::default().evaluate(&pos, at(20)),
            ExitSignal::Exit(ExitReason::StopLoss)
        );
    }

    #[test]
    fn profit_target_at_half_credit() {
        let mut pos = position();
        pos.mark_premium = 0.5;
        assert_eq!(
            PositionManager::default().evaluate(&pos, at(1)),
            ExitSignal::Exit(ExitReason::ProfitTarget)
        );
    }

    #[test]
    fn time_exit_at_21_dte() {
        let pm = PositionManager::default();
        assert_eq!(pm.evaluate(&position(), at(13)), ExitSignal::Hold);
        assert_eq!(pm.evaluate(&position(), at(14)), ExitSignal::Exit(ExitReason::TimeExit));
    }

    #[test]
    fn expired_positions_settle() {
        assert_eq!(PositionManager::default().evaluate(&position(), at(35)), ExitSignal::Settle);
    }
}
