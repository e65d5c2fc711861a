//! Gap risk model: exposure of breached positions across market-closed intervals.
//!
//! A stop that is breached while the market is closed cannot execute until the
//! next open. When two consecutive timestamps straddle a session open, every
//! open position whose stop was already breached at the earlier timestamp
//! takes a gap:
//!
//! magnitude = avg_overnight_gap × (weekend or holiday ? 1.6 : 1) × (earnings ? 3.0 : 1)
//!
//! The gap is charged as extra adverse slippage on the pending stop-loss exit.
//! Positions inside their stop are never touched.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::MarketCalendar;
use crate::config::{ensure_fraction, ensure_non_negative, ConfigError};
use crate::domain::{GapEvent, GapTrigger, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapModelConfig {
    pub enable_gap_risk: bool,
    /// Base overnight gap as a fraction of the underlying price.
    pub avg_overnight_gap: f64,
    pub weekend_gap_multiplier: f64,
    pub earnings_gap_multiplier: f64,
    /// Extra cost fraction added to the stop-loss exit after a gap.
    pub gap_stop_loss_slippage: f64,
}

impl Default for GapModelConfig {
    fn default() -> Self {
        Self {
            enable_gap_risk: true,
            avg_overnight_gap: 0.005,
            weekend_gap_multiplier: 1.6,
            earnings_gap_multiplier: 3.0,
            gap_stop_loss_slippage: 0.02,
        }
    }
}

impl GapModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_fraction("gap.avg_overnight_gap", self.avg_overnight_gap)?;
        ensure_non_negative("gap.weekend_gap_multiplier", self.weekend_gap_multiplier)?;
        ensure_non_negative("gap.earnings_gap_multiplier", self.earnings_gap_multiplier)?;
        ensure_fraction("gap.gap_stop_loss_slippage", self.gap_stop_loss_slippage)?;
        Ok(())
    }
}

/// Classification of one market-closed interval for one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapClass {
    pub trigger: GapTrigger,
    pub spans_non_trading_day: bool,
    pub has_earnings: bool,
    /// Gap size as a fraction of the underlying price.
    pub magnitude: f64,
}

#[derive(Debug, Clone)]
pub struct GapRiskModel {
    config: GapModelConfig,
    calendar: MarketCalendar,
}

impl GapRiskModel {
    pub fn new(config: GapModelConfig, calendar: MarketCalendar) -> Self {
        Self { config, calendar }
    }

    pub fn config(&self) -> &GapModelConfig {
        &self.config
    }

    /// Whether the step from `prev` to `next` crosses a session close into the
    /// next session open. Always false when gap risk is disabled.
    pub fn should_check(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        self.config.enable_gap_risk && self.calendar.crosses_closed_session(prev, next)
    }

    pub fn classify(&self, symbol: &str, prev: NaiveDateTime, next: NaiveDateTime) -> GapClass {
        let spans_non_trading_day = self.calendar.spans_non_trading_day(prev, next);
        let has_earnings = self.calendar.has_earnings_between(symbol, prev, next);

        let mut magnitude = self.config.avg_overnight_gap;
        if spans_non_trading_day {
            magnitude *= self.config.weekend_gap_multiplier;
        }
        if has_earnings {
            magnitude *= self.config.earnings_gap_multiplier;
        }

        let trigger = if has_earnings {
            GapTrigger::Earnings
        } else if spans_non_trading_day {
            GapTrigger::Weekend
        } else {
            GapTrigger::Overnight
        };

        GapClass {
            trigger,
            spans_non_trading_day,
            has_earnings,
            magnitude,
        }
    }

    /// Apply a gap to `position` if it was already past its stop at `prev`
    /// and the interval to `next` crosses a closed market.
    pub fn apply_gap(
        &self,
        position: &mut Position,
        prev: NaiveDateTime,
        next: NaiveDateTime,
    ) -> Option<GapEvent> {
        if !position.is_open() || !position.stop_breached_by(prev) || !self.should_check(prev, next) {
            return None;
        }
        let class = self.classify(&position.symbol, prev, next);
        let extra = self.config.gap_stop_loss_slippage;
        position.gap_slippage += extra;

        Some(GapEvent {
            position_id: position.id,
            symbol: position.symbol.clone(),
            trigger: class.trigger,
            gap_fraction: class.magnitude,
            gap_move: class.magnitude * position.last_underlying * position.adverse_direction(),
            extra_slippage: extra,
            from: prev,
            to: next,
        })
    }
}
