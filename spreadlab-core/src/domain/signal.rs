//! Signals and their legs.
//!
//! A `Signal` is immutable once created and consumed exactly once: the
//! execution coordinator takes it by value, so a signal cannot be routed twice.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::SignalId;
use super::option::{spread_fraction, OptionContract, OptionQuote, CONTRACT_MULTIPLIER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Premium sign convention: selling receives premium (+1), buying pays (-1).
    pub fn premium_sign(self) -> f64 {
        match self {
            Self::Sell => 1.0,
            Self::Buy => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Structure of a multi-leg candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Bull put credit spread.
    CreditPutSpread,
    /// Bear call credit spread.
    CreditCallSpread,
    DebitPutSpread,
    DebitCallSpread,
    Custom,
}

impl SignalKind {
    /// Whether the structure profits from a falling underlying.
    pub fn is_bearish(self) -> bool {
        matches!(self, Self::CreditCallSpread | Self::DebitPutSpread)
    }
}

/// One leg of a signal, with the quote it was generated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub contract: OptionContract,
    pub side: Side,
    pub quantity: u32,
    pub bid: f64,
    pub ask: f64,
    pub open_interest: u64,
    pub avg_daily_volume: Option<f64>,
    pub implied_volatility: f64,
    pub delta: f64,
}

impl Leg {
    pub fn from_quote(quote: &OptionQuote, side: Side, quantity: u32) -> Self {
        Self {
            contract: quote.contract.clone(),
            side,
            quantity,
            bid: quote.bid,
            ask: quote.ask,
            open_interest: quote.open_interest,
            avg_daily_volume: quote.avg_daily_volume,
            implied_volatility: quote.implied_volatility,
            delta: quote.delta,
        }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread_pct(&self) -> f64 {
        spread_fraction(self.bid, self.ask)
    }
}

/// Malformed signal. Never executed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("signal has no legs")]
    NoLegs,
    #[error("leg {leg} has zero quantity")]
    ZeroQuantity { leg: String },
    #[error("leg {leg} has an invalid quote (bid {bid}, ask {ask})")]
    InvalidQuote { leg: String, bid: f64, ask: f64 },
    #[error("leg {leg} has a non-positive strike")]
    InvalidStrike { leg: String },
    #[error("leg {leg} is on {found}, expected underlying {expected}")]
    UnderlyingMismatch { leg: String, expected: String, found: String },
}

/// A candidate multi-leg trade emitted by the signal pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub symbol: String,
    pub strategy: String,
    pub kind: SignalKind,
    /// Ordered legs; the first leg is the anchor leg used for cost estimation.
    pub legs: Vec<Leg>,
    /// Minimum credit (positive) or maximum debit (negative) per spread unit.
    pub target_premium: f64,
    pub generated_at: NaiveDateTime,
}

impl Signal {
    pub fn anchor_leg(&self) -> Option<&Leg> {
        self.legs.first()
    }

    /// Number of spread units (the smallest leg quantity).
    pub fn units(&self) -> u32 {
        self.legs.iter().map(|l| l.quantity).min().unwrap_or(0)
    }

    /// Net mid premium per spread unit: positive for credit, negative for debit.
    pub fn net_mid_premium(&self) -> f64 {
        self.legs
            .iter()
            .map(|l| l.side.premium_sign() * l.mid() * (l.quantity as f64 / self.units().max(1) as f64))
            .sum()
    }

    pub fn is_credit(&self) -> bool {
        self.net_mid_premium() > 0.0
    }

    /// Nearest-expiring leg's DTE as of the generation timestamp.
    pub fn aggregate_dte(&self) -> Option<i64> {
        let as_of = self.generated_at.date();
        self.legs
            .iter()
            .map(|l| l.contract.days_to_expiration(as_of))
            .min()
    }

    /// Widest strike distance between a sold leg and a bought leg of the same right.
    pub fn strike_width(&self) -> Option<f64> {
        let mut width: Option<f64> = None;
        for short in self.legs.iter().filter(|l| l.side == Side::Sell) {
            for long in self
                .legs
                .iter()
                .filter(|l| l.side == Side::Buy && l.contract.right == short.contract.right)
            {
                let w = (short.contract.strike - long.contract.strike).abs();
                width = Some(width.map_or(w, |cur: f64| cur.max(w)));
            }
        }
        width
    }

    /// Capital at risk if the signal is executed at its mid premium.
    ///
    /// Credit structures risk the strike width minus the credit (or the full
    /// strike of the sold leg when uncovered); debit structures risk the debit.
    pub fn capital_requirement(&self) -> f64 {
        let net = self.net_mid_premium();
        let per_unit = if net > 0.0 {
            match self.strike_width() {
                Some(width) => (width - net).max(0.0),
                None => self
                    .legs
                    .iter()
                    .filter(|l| l.side == Side::Sell)
                    .map(|l| l.contract.strike)
                    .fold(0.0, f64::max),
            }
        } else {
            -net
        };
        per_unit * CONTRACT_MULTIPLIER * self.units() as f64
    }

    /// Structural validation performed before any risk or fill evaluation.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.legs.is_empty() {
            return Err(SignalError::NoLegs);
        }
        for leg in &self.legs {
            let name = leg.contract.occ_symbol();
            if leg.quantity == 0 {
                return Err(SignalError::ZeroQuantity { leg: name });
            }
            if !leg.bid.is_finite() || !leg.ask.is_finite() || leg.bid < 0.0 || leg.ask < leg.bid {
                return Err(SignalError::InvalidQuote {
                    leg: name,
                    bid: leg.bid,
                    ask: leg.ask,
                });
            }
            if leg.contract.strike.is_nan() || leg.contract.strike <= 0.0 {
                return Err(SignalError::InvalidStrike { leg: name });
            }
            if leg.contract.underlying != self.symbol {
                return Err(SignalError::UnderlyingMismatch {
                    leg: name,
                    expected: self.symbol.clone(),
                    found: leg.contract.underlying.clone(),
                });
            }
        }
        Ok(())
    }
}
