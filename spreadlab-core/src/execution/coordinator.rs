//! Execution coordinator: routes one signal or exit through risk, fill and cost.
//!
//! Entry state machine per signal:
//!
//! ```text
//! GENERATED ──validate──▶ RISK_CHECKED ──fill/broker──▶ FILL_EVALUATED ──▶ EXECUTED
//!     │                        │                              │
//!     └──────────────▶ REJECTED ◀──────────────────────────────┘
//! ```
//!
//! Every leg of a signal is evaluated against the fill model and every leg
//! consumes one draw. The signal executes only if all legs pass; otherwise it
//! is rejected with the reason of the first failing leg. No partial positions.
//!
//! Fill prices are mid adjusted by the slippage cost fraction, directionally:
//! credit received shrinks, debit paid grows. One cost fraction per order,
//! taken from the anchor (first) leg.

use chrono::NaiveDateTime;

use super::broker::{BrokerError, ExecutionMode};
use crate::calendar::MarketCalendar;
use crate::config::SimulationConfig;
use crate::domain::{
    ExitReason, IdGen, Leg, PortfolioState, Position, RejectionReason, RejectionRecord,
    RejectionStage, Signal,
};
use crate::models::{FillAssessment, FillContext, FillProbabilityModel, SlippageModel};
use crate::risk::{RiskDecision, RiskManager};
use crate::rng::RandomSource;

/// Market state at the moment an order is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub timestamp: NaiveDateTime,
    pub volatility_index: f64,
    pub underlying_price: f64,
}

#[derive(Debug)]
pub enum EntryOutcome {
    Executed(Position),
    Rejected(RejectionRecord),
}

#[derive(Debug)]
pub enum ExitOutcome {
    Closed { exit_premium: f64, realized_pnl: f64 },
    Rejected(RejectionRecord),
}

/// First leg that failed its fill draw.
#[derive(Debug, Clone, Copy)]
struct LegFailure {
    index: usize,
    assessment: FillAssessment,
    draw: f64,
}

#[derive(Debug)]
pub struct ExecutionCoordinator {
    slippage: SlippageModel,
    fill: FillProbabilityModel,
    risk: RiskManager,
    calendar: MarketCalendar,
    commission_per_contract: f64,
    mode: ExecutionMode,
}

impl ExecutionCoordinator {
    pub fn new(config: &SimulationConfig, mode: ExecutionMode) -> Self {
        Self {
            slippage: SlippageModel::new(config.slippage.clone()),
            fill: FillProbabilityModel::new(config.fill.clone()),
            risk: RiskManager::new(config.risk.clone()),
            calendar: MarketCalendar::new(&config.calendar),
            commission_per_contract: config.commission_per_contract,
            mode,
        }
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    pub fn slippage(&self) -> &SlippageModel {
        &self.slippage
    }

    /// Route a signal to a position or a rejection. Consumes the signal.
    pub fn execute_entry(
        &mut self,
        signal: Signal,
        portfolio: &PortfolioState,
        market: &MarketContext,
        rng: &mut dyn RandomSource,
        ids: &mut IdGen,
    ) -> EntryOutcome {
        let reject = |reason: RejectionReason, stage: RejectionStage, leg: Option<String>, detail: String| {
            tracing::debug!(signal = %signal.id, %reason, ?stage, %detail, "signal rejected");
            EntryOutcome::Rejected(RejectionRecord {
                signal_id: Some(signal.id),
                position_id: None,
                symbol: signal.symbol.clone(),
                leg,
                reason,
                stage,
                detail,
                is_closing: false,
                timestamp: market.timestamp,
            })
        };

        // ─── GENERATED ───
        if let Err(e) = signal.validate() {
            return reject(RejectionReason::InvalidSignal, RejectionStage::Generated, None, e.to_string());
        }

        // ─── RISK_CHECKED ───
        if let RiskDecision::Reject(why) = self.risk.evaluate(&signal, portfolio) {
            return reject(RejectionReason::RiskLimit, RejectionStage::RiskChecked, None, why.to_string());
        }

        // ─── FILL_EVALUATED ───
        let broker_order_id = match &mut self.mode {
            ExecutionMode::Backtest => {
                let bucket = self.calendar.time_bucket(market.timestamp);
                let contexts = signal
                    .legs
                    .iter()
                    .map(|leg| FillContext::for_leg(leg, bucket, market.volatility_index, false));
                if let Some(failure) = evaluate_fills(&self.fill, contexts, rng) {
                    let leg = &signal.legs[failure.index];
                    return reject(
                        failure.assessment.rule.rejection_reason(),
                        RejectionStage::FillEvaluated,
                        Some(leg.contract.occ_symbol()),
                        format!(
                            "draw {:.4} >= fill probability {:.4} ({:?})",
                            failure.draw, failure.assessment.probability, failure.assessment.rule
                        ),
                    );
                }
                None
            }
            ExecutionMode::Live(broker) => match broker.submit_order(&signal.legs) {
                Ok(order_id) => Some(order_id),
                Err(e) => {
                    return reject(RejectionReason::Broker, RejectionStage::FillEvaluated, None, e.to_string());
                }
            },
        };

        // ─── EXECUTED ───
        let cost = self.entry_cost(&signal, market);
        let scale = if signal.is_credit() { 1.0 - cost } else { 1.0 + cost };
        let commission = order_commission(self.commission_per_contract, signal.legs.iter().map(|l| l.quantity));
        let position = Position::from_signal(
            ids.next_position_id(),
            &signal,
            scale,
            market.underlying_price,
            market.timestamp,
            commission,
            broker_order_id,
        );
        tracing::debug!(
            signal = %signal.id,
            position = %position.id,
            entry_premium = position.entry_premium,
            cost,
            "signal executed"
        );
        EntryOutcome::Executed(position)
    }

    fn entry_cost(&self, signal: &Signal, market: &MarketContext) -> f64 {
        let as_of = market.timestamp.date();
        signal.anchor_leg().map_or(0.0, |leg: &Leg| {
            self.slippage.estimate_cost(
                leg.delta,
                leg.contract.days_to_expiration(as_of),
                market.volatility_index,
            )
        })
    }

    /// Close `position` for `reason`. On rejection the position stays open
    /// and its pending exit is kept for the next timestamp.
    pub fn execute_exit(
        &mut self,
        position: &mut Position,
        reason: ExitReason,
        market: &MarketContext,
        rng: &mut dyn RandomSource,
    ) -> ExitOutcome {
        let reject = |position: &Position, reason: RejectionReason, leg: Option<String>, detail: String| {
            tracing::debug!(position = %position.id, %reason, %detail, "exit rejected");
            ExitOutcome::Rejected(RejectionRecord {
                signal_id: Some(position.signal_id),
                position_id: Some(position.id),
                symbol: position.symbol.clone(),
                leg,
                reason,
                stage: RejectionStage::FillEvaluated,
                detail,
                is_closing: true,
                timestamp: market.timestamp,
            })
        };

        match &mut self.mode {
            ExecutionMode::Backtest => {
                let bucket = self.calendar.time_bucket(market.timestamp);
                let contexts = position
                    .legs
                    .iter()
                    .map(|leg| FillContext::for_position_leg(leg, bucket, market.volatility_index));
                if let Some(failure) = evaluate_fills(&self.fill, contexts, rng) {
                    let leg = position.legs[failure.index].contract.occ_symbol();
                    let detail = format!(
                        "draw {:.4} >= fill probability {:.4} ({:?})",
                        failure.draw, failure.assessment.probability, failure.assessment.rule
                    );
                    return reject(position, failure.assessment.rule.rejection_reason(), Some(leg), detail);
                }
            }
            ExecutionMode::Live(broker) => {
                let closing: Vec<Leg> = position.legs.iter().map(|l| l.closing_leg()).collect();
                if let Err(e) = broker.submit_order(&closing) {
                    return reject(position, RejectionReason::Broker, None, broker_detail(&e));
                }
            }
        }

        let cost = position.anchor_leg().map_or(0.0, |leg| {
            self.slippage.estimate_cost(
                leg.delta,
                leg.contract.days_to_expiration(market.timestamp.date()),
                market.volatility_index,
            )
        });
        let mark = position.mark_premium;
        let exit_premium = mark + mark.abs() * (cost + position.gap_slippage);
        let commission = order_commission(self.commission_per_contract, position.legs.iter().map(|l| l.quantity));
        position.close(market.timestamp, exit_premium, reason, commission);
        let realized_pnl = position.realized_pnl.unwrap_or(0.0);
        tracing::debug!(
            position = %position.id,
            ?reason,
            exit_premium,
            gap_slippage = position.gap_slippage,
            realized_pnl,
            "position closed"
        );
        ExitOutcome::Closed {
            exit_premium,
            realized_pnl,
        }
    }

    /// Settle an expired position at intrinsic value. Never goes through the fill model.
    pub fn settle_expiration(&self, position: &mut Position, underlying_price: f64, at: NaiveDateTime) -> f64 {
        let premium = position.settlement_premium(underlying_price);
        position.close(at, premium, ExitReason::Expiration, 0.0);
        position.realized_pnl.unwrap_or(0.0)
    }
}

/// Evaluate every context, drawing once per leg. Returns the first failure.
fn evaluate_fills(
    model: &FillProbabilityModel,
    contexts: impl Iterator<Item = FillContext>,
    rng: &mut dyn RandomSource,
) -> Option<LegFailure> {
    let mut first_failure = None;
    for (index, ctx) in contexts.enumerate() {
        let assessment = model.assess(&ctx);
        let draw = rng.next_uniform();
        if draw >= assessment.probability && first_failure.is_none() {
            first_failure = Some(LegFailure {
                index,
                assessment,
                draw,
            });
        }
    }
    first_failure
}

/// Commission for one order: per contract, per leg.
fn order_commission(per_contract: f64, quantities: impl Iterator<Item = u32>) -> f64 {
    quantities.map(|q| q as f64).sum::<f64>() * per_contract
}

fn broker_detail(e: &BrokerError) -> String {
    format!("closing order failed: {e}")
}
