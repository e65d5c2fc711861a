//! Spread positions: lifecycle, marks and P&L.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ids::{PositionId, SignalId};
use super::option::{spread_fraction, OptionChain, OptionContract, CONTRACT_MULTIPLIER};
use super::signal::{Leg, Side, Signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
    /// Still open when the run ended. Valued at the last mark; not a real fill.
    ClosedAtEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    ProfitTarget,
    StopLoss,
    TimeExit,
    Expiration,
    EndOfRun,
}

/// A filled leg plus the latest quote seen for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLeg {
    pub contract: OptionContract,
    pub side: Side,
    pub quantity: u32,
    pub fill_price: f64,
    pub entry_delta: f64,
    pub bid: f64,
    pub ask: f64,
    pub open_interest: u64,
    pub avg_daily_volume: Option<f64>,
    pub implied_volatility: f64,
    pub delta: f64,
}

impl PositionLeg {
    fn from_leg(leg: &Leg, fill_price: f64) -> Self {
        Self {
            contract: leg.contract.clone(),
            side: leg.side,
            quantity: leg.quantity,
            fill_price,
            entry_delta: leg.delta,
            bid: leg.bid,
            ask: leg.ask,
            open_interest: leg.open_interest,
            avg_daily_volume: leg.avg_daily_volume,
            implied_volatility: leg.implied_volatility,
            delta: leg.delta,
        }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread_pct(&self) -> f64 {
        spread_fraction(self.bid, self.ask)
    }

    /// The order leg that flattens this leg at its latest quote.
    pub fn closing_leg(&self) -> Leg {
        Leg {
            contract: self.contract.clone(),
            side: self.side.opposite(),
            quantity: self.quantity,
            bid: self.bid,
            ask: self.ask,
            open_interest: self.open_interest,
            avg_daily_volume: self.avg_daily_volume,
            implied_volatility: self.implied_volatility,
            delta: self.delta,
        }
    }
}

/// An executed multi-leg position.
///
/// Premiums follow the signal convention: positive is a net credit, negative
/// a net debit, per spread unit. P&L per unit is `entry_premium - mark`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub signal_id: SignalId,
    pub symbol: String,
    pub strategy: String,
    pub kind: SignalKind,
    pub entered_at: NaiveDateTime,
    pub legs: Vec<PositionLeg>,
    pub units: u32,
    pub entry_premium: f64,
    pub mark_premium: f64,
    pub underlying_at_entry: f64,
    pub last_underlying: f64,
    pub capital_requirement: f64,
    /// First timestamp at which the stop-loss threshold was breached.
    pub stop_breached_at: Option<NaiveDateTime>,
    /// Exit triggered at a previous timestamp, executed at the next one.
    pub pending_exit: Option<ExitReason>,
    /// Extra adverse slippage owed by the exit after a market-closed gap.
    pub gap_slippage: f64,
    pub broker_order_id: Option<String>,
    pub entry_commission: f64,
    pub exit_commission: f64,
    pub status: PositionStatus,
    pub closed_at: Option<NaiveDateTime>,
    pub exit_premium: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub realized_pnl: Option<f64>,
}

impl Position {
    /// Promote every leg of `signal` into a position. Each leg's fill price is
    /// its mid scaled by `price_scale`, so the net entry premium is the net mid
    /// scaled by the same factor.
    #[allow(clippy::too_many_arguments)]
    pub fn from_signal(
        id: PositionId,
        signal: &Signal,
        price_scale: f64,
        underlying_price: f64,
        opened_at: NaiveDateTime,
        entry_commission: f64,
        broker_order_id: Option<String>,
    ) -> Self {
        let legs: Vec<PositionLeg> = signal
            .legs
            .iter()
            .map(|leg| PositionLeg::from_leg(leg, leg.mid() * price_scale))
            .collect();
        let units = signal.units();
        let entry_premium = net_premium(&legs, units, |l| l.fill_price);
        let mark_premium = net_premium(&legs, units, PositionLeg::mid);
        Self {
            id,
            signal_id: signal.id,
            symbol: signal.symbol.clone(),
            strategy: signal.strategy.clone(),
            kind: signal.kind,
            entered_at: opened_at,
            legs,
            units,
            entry_premium,
            mark_premium,
            underlying_at_entry: underlying_price,
            last_underlying: underlying_price,
            capital_requirement: signal.capital_requirement(),
            stop_breached_at: None,
            pending_exit: None,
            gap_slippage: 0.0,
            broker_order_id,
            entry_commission,
            exit_commission: 0.0,
            status: PositionStatus::Open,
            closed_at: None,
            exit_premium: None,
            exit_reason: None,
            realized_pnl: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn is_credit(&self) -> bool {
        self.entry_premium > 0.0
    }

    /// Direction the underlying must move to hurt this position.
    pub fn adverse_direction(&self) -> f64 {
        if self.kind.is_bearish() {
            1.0
        } else {
            -1.0
        }
    }

    pub fn unrealized_pnl_per_unit(&self) -> f64 {
        self.entry_premium - self.mark_premium
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl_per_unit() * CONTRACT_MULTIPLIER * self.units as f64
    }

    /// Unrealized loss as a fraction of the entry premium (0 when in profit).
    pub fn loss_fraction(&self) -> f64 {
        let basis = self.entry_premium.abs();
        if basis <= 0.0 {
            return 0.0;
        }
        (-self.unrealized_pnl_per_unit() / basis).max(0.0)
    }

    pub fn profit_fraction(&self) -> f64 {
        let basis = self.entry_premium.abs();
        if basis <= 0.0 {
            return 0.0;
        }
        (self.unrealized_pnl_per_unit() / basis).max(0.0)
    }

    /// Whether the stop had already been breached at or before `at`.
    pub fn stop_breached_by(&self, at: NaiveDateTime) -> bool {
        self.stop_breached_at.is_some_and(|t| t <= at)
    }

    /// Nearest leg expiration in days.
    pub fn days_to_expiration(&self, as_of: NaiveDate) -> Option<i64> {
        self.legs
            .iter()
            .map(|l| l.contract.days_to_expiration(as_of))
            .min()
    }

    pub fn anchor_leg(&self) -> Option<&PositionLeg> {
        self.legs.first()
    }

    /// Update leg quotes and the net mark from a chain snapshot.
    ///
    /// Legs missing from the chain keep their previous quote. Returns the
    /// number of legs refreshed.
    pub fn refresh_marks(&mut self, chain: &OptionChain) -> usize {
        let mut refreshed = 0;
        for leg in &mut self.legs {
            if let Some(quote) = chain.find(&leg.contract) {
                leg.bid = quote.bid;
                leg.ask = quote.ask;
                leg.open_interest = quote.open_interest;
                leg.avg_daily_volume = quote.avg_daily_volume;
                leg.implied_volatility = quote.implied_volatility;
                leg.delta = quote.delta;
                refreshed += 1;
            }
        }
        self.last_underlying = chain.underlying_price;
        self.mark_premium = net_premium(&self.legs, self.units, PositionLeg::mid);
        refreshed
    }

    /// Net premium per unit at expiration given the underlying price.
    pub fn settlement_premium(&self, underlying_price: f64) -> f64 {
        net_premium(&self.legs, self.units, |l| l.contract.intrinsic_value(underlying_price))
    }

    pub fn close(&mut self, at: NaiveDateTime, exit_premium: f64, reason: ExitReason, exit_commission: f64) {
        let gross = (self.entry_premium - exit_premium) * CONTRACT_MULTIPLIER * self.units as f64;
        self.exit_commission = exit_commission;
        self.realized_pnl = Some(gross - self.entry_commission - exit_commission);
        self.exit_premium = Some(exit_premium);
        self.exit_reason = Some(reason);
        self.closed_at = Some(at);
        self.pending_exit = None;
        self.status = PositionStatus::Closed;
    }

    /// Terminal accounting close at the last mark, without slippage or commission.
    pub fn close_at_end(&mut self, at: NaiveDateTime) {
        self.realized_pnl = Some(self.unrealized_pnl() - self.entry_commission);
        self.exit_premium = Some(self.mark_premium);
        self.exit_reason = Some(ExitReason::EndOfRun);
        self.closed_at = Some(at);
        self.status = PositionStatus::ClosedAtEnd;
    }
}

fn net_premium(legs: &[PositionLeg], units: u32, price: impl Fn(&PositionLeg) -> f64) -> f64 {
    let units = units.max(1) as f64;
    legs.iter()
        .map(|l| l.side.premium_sign() * price(l) * (l.quantity as f64 / units))
        .sum()
}
