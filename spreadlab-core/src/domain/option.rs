//! Option contract identity, chain quotes and chain snapshots.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract multiplier for US equity options.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    fn code(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

/// Identity of a listed option: underlying, expiration, strike and right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub strike: f64,
    pub right: OptionRight,
}

impl OptionContract {
    pub fn new(underlying: impl Into<String>, expiration: NaiveDate, strike: f64, right: OptionRight) -> Self {
        Self {
            underlying: underlying.into(),
            expiration,
            strike,
            right,
        }
    }

    /// Calendar days from `as_of` to expiration (negative once expired).
    pub fn days_to_expiration(&self, as_of: NaiveDate) -> i64 {
        (self.expiration - as_of).num_days()
    }

    /// OCC-style symbol, e.g. `SPY240419P00400000`.
    pub fn occ_symbol(&self) -> String {
        format!(
            "{}{}{}{:08}",
            self.underlying,
            self.expiration.format("%y%m%d"),
            self.right.code(),
            (self.strike * 1000.0).round() as u64
        )
    }

    /// Value at expiration per share given the underlying price.
    pub fn intrinsic_value(&self, underlying_price: f64) -> f64 {
        match self.right {
            OptionRight::Call => (underlying_price - self.strike).max(0.0),
            OptionRight::Put => (self.strike - underlying_price).max(0.0),
        }
    }

    pub fn same_contract(&self, other: &OptionContract) -> bool {
        self.underlying == other.underlying
            && self.expiration == other.expiration
            && self.right == other.right
            && (self.strike - other.strike).abs() < 1e-9
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.occ_symbol())
    }
}

/// One row of an option chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract: OptionContract,
    pub bid: f64,
    pub ask: f64,
    pub open_interest: u64,
    /// Average daily contract volume, when the source provides it.
    pub avg_daily_volume: Option<f64>,
    pub implied_volatility: f64,
    /// Signed delta (puts negative).
    pub delta: f64,
}

impl OptionQuote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Bid-ask spread as a fraction of mid. Infinite when mid is zero.
    pub fn spread_pct(&self) -> f64 {
        spread_fraction(self.bid, self.ask)
    }
}

pub(crate) fn spread_fraction(bid: f64, ask: f64) -> f64 {
    let mid = (bid + ask) / 2.0;
    if mid <= 0.0 {
        f64::INFINITY
    } else {
        (ask - bid) / mid
    }
}

/// Option chain for one underlying at one timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    pub as_of: NaiveDateTime,
    pub underlying_price: f64,
    pub quotes: Vec<OptionQuote>,
}

impl OptionChain {
    pub fn find(&self, contract: &OptionContract) -> Option<&OptionQuote> {
        self.quotes.iter().find(|q| q.contract.same_contract(contract))
    }

    /// Quotes of one right whose DTE lies within `[min_dte, max_dte]`.
    pub fn quotes_in_window(
        &self,
        right: OptionRight,
        min_dte: i64,
        max_dte: i64,
    ) -> impl Iterator<Item = &OptionQuote> {
        let as_of = self.as_of.date();
        self.quotes.iter().filter(move |q| {
            let dte = q.contract.days_to_expiration(as_of);
            q.contract.right == right && dte >= min_dte && dte <= max_dte
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(strike: f64) -> OptionContract {
        OptionContract::new("SPY", NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(), strike, OptionRight::Put)
    }

    #[test]
    fn occ_symbol_format() {
        assert_eq!(put(400.0).occ_symbol(), "SPY240419P00400000");
        assert_eq!(put(402.5).occ_symbol(), "SPY240419P00402500");
    }

    #[test]
    fn days_to_expiration_counts_calendar_days() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(put(400.0).days_to_expiration(as_of), 35);
    }

    #[test]
    fn intrinsic_value_by_right() {
        assert_eq!(put(400.0).intrinsic_value(390.0), 10.0);
        assert_eq!(put(400.0).intrinsic_value(410.0), 0.0);
        let call = OptionContract { right: OptionRight::Call, ..put(400.0) };
        assert_eq!(call.intrinsic_value(410.0), 10.0);
    }

    #[test]
    fn spread_pct_of_mid() {
        let q = OptionQuote {
            contract: put(400.0),
            bid: 2.955,
            ask: 3.045,
            open_interest: 1000,
            avg_daily_volume: None,
            implied_volatility: 0.18,
            delta: -0.20,
        };
        assert!((q.mid() - 3.0).abs() < 1e-12);
        assert!((q.spread_pct() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn zero_mid_spread_is_infinite() {
        assert!(spread_fraction(0.0, 0.0).is_infinite());
    }
}
