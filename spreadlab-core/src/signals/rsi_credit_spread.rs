//! RSI mean-reversion credit spreads.
//!
//! RSI at or below `oversold` sells a bull put spread; RSI at or above
//! `overbought` sells a bear call spread. Strike selection:
//! - expiration inside `[min_dte, max_dte]` closest to `target_dte` (earlier wins ties)
//! - short strike with |delta| closest to `target_delta`, within `delta_tolerance`
//! - long strike exactly `spread_width` further out of the money
//! - net mid credit must be at least `min_credit`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{MarketSnapshot, SignalGenerator, SignalProposal};
use crate::config::{ensure_fraction, ensure_non_negative, ensure_positive, ConfigError};
use crate::domain::{Leg, OptionQuote, OptionRight, Side, SignalKind};
use crate::indicators::Rsi;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Absolute delta of the short strike.
    pub target_delta: f64,
    pub delta_tolerance: f64,
    /// Strike distance between short and long legs.
    pub spread_width: f64,
    /// Minimum net mid credit per spread.
    pub min_credit: f64,
    pub min_dte: i64,
    pub max_dte: i64,
    pub target_dte: i64,
    /// Spreads per signal.
    pub contracts: u32,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold: 45.0,
            overbought: 70.0,
            target_delta: 0.20,
            delta_tolerance: 0.10,
            spread_width: 5.0,
            min_credit: 0.50,
            min_dte: 30,
            max_dte: 45,
            target_dte: 35,
            contracts: 1,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rsi_period == 0 {
            return Err(ConfigError::Invalid {
                field: "strategy.rsi_period",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=100.0).contains(&self.oversold)
            || !(0.0..=100.0).contains(&self.overbought)
            || self.oversold >= self.overbought
        {
            return Err(ConfigError::Invalid {
                field: "strategy.oversold",
                reason: format!(
                    "need 0 <= oversold ({}) < overbought ({}) <= 100",
                    self.oversold, self.overbought
                ),
            });
        }
        ensure_fraction("strategy.target_delta", self.target_delta)?;
        ensure_non_negative("strategy.delta_tolerance", self.delta_tolerance)?;
        ensure_positive("strategy.spread_width", self.spread_width)?;
        ensure_non_negative("strategy.min_credit", self.min_credit)?;
        if self.min_dte < 0 || self.min_dte > self.max_dte {
            return Err(ConfigError::Invalid {
                field: "strategy.min_dte",
                reason: format!("invalid DTE window [{}, {}]", self.min_dte, self.max_dte),
            });
        }
        if self.contracts == 0 {
            return Err(ConfigError::Invalid {
                field: "strategy.contracts",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RsiCreditSpread {
    params: StrategyParams,
    rsi: Rsi,
}

impl RsiCreditSpread {
    pub fn new(params: StrategyParams) -> Self {
        let rsi = Rsi::new(params.rsi_period);
        Self { params, rsi }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn pick_expiration(&self, quotes: &[&OptionQuote], as_of: NaiveDate) -> Option<NaiveDate> {
        quotes
            .iter()
            .map(|q| q.contract.expiration)
            .min_by_key(|exp| {
                let dte = (*exp - as_of).num_days();
                ((dte - self.params.target_dte).abs(), *exp)
            })
    }

    fn pick_short<'a>(&self, quotes: &[&'a OptionQuote]) -> Option<&'a OptionQuote> {
        let target = self.params.target_delta;
        quotes
            .iter()
            .copied()
            .filter(|q| q.bid > 0.0 && (q.delta.abs() - target).abs() <= self.params.delta_tolerance)
            .min_by(|a, b| {
                let da = (a.delta.abs() - target).abs();
                let db = (b.delta.abs() - target).abs();
                da.total_cmp(&db).then(a.contract.strike.total_cmp(&b.contract.strike))
            })
    }
}

impl SignalGenerator for RsiCreditSpread {
    fn name(&self) -> &str {
        "rsi_credit_spread"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Option<SignalProposal> {
        let rsi = self.rsi.latest(snapshot.closes)?;
        let (right, kind) = if rsi <= self.params.oversold {
            (OptionRight::Put, SignalKind::CreditPutSpread)
        } else if rsi >= self.params.overbought {
            (OptionRight::Call, SignalKind::CreditCallSpread)
        } else {
            return None;
        };

        let as_of = snapshot.chain.as_of.date();
        let window: Vec<&OptionQuote> = snapshot
            .chain
            .quotes_in_window(right, self.params.min_dte, self.params.max_dte)
            .collect();
        let expiration = self.pick_expiration(&window, as_of)?;
        let expiry_quotes: Vec<&OptionQuote> = window
            .into_iter()
            .filter(|q| q.contract.expiration == expiration)
            .collect();

        let short = self.pick_short(&expiry_quotes)?;
        let long_strike = match right {
            OptionRight::Put => short.contract.strike - self.params.spread_width,
            OptionRight::Call => short.contract.strike + self.params.spread_width,
        };
        let long = expiry_quotes
            .iter()
            .copied()
            .find(|q| (q.contract.strike - long_strike).abs() < 1e-6)?;

        let credit = short.mid() - long.mid();
        if credit < self.params.min_credit {
            tracing::debug!(
                symbol = snapshot.symbol,
                credit,
                min_credit = self.params.min_credit,
                "credit below minimum"
            );
            return None;
        }

        let qty = self.params.contracts;
        Some(SignalProposal {
            kind,
            legs: vec![
                Leg::from_quote(short, Side::Sell, qty),
                Leg::from_quote(long, Side::Buy, qty),
            ],
            target_premium: self.params.min_credit,
        })
    }
}
