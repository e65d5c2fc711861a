//! Signal pipeline: turns indicator state and an option chain into candidate spreads.
//!
//! Generators are portfolio-agnostic: they receive a market snapshot, never
//! position or portfolio state. The pipeline stamps the proposal with an ID,
//! symbol, strategy name and timestamp, producing at most one `Signal` per
//! symbol per evaluation pass.

pub mod rsi_credit_spread;

pub use rsi_credit_spread::{RsiCreditSpread, StrategyParams};

use chrono::NaiveDateTime;

use crate::domain::{IdGen, Leg, OptionChain, Signal, SignalKind};

/// Market state for one symbol at one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot<'a> {
    pub symbol: &'a str,
    pub as_of: NaiveDateTime,
    /// Close history up to and including `as_of`.
    pub closes: &'a [f64],
    pub chain: &'a OptionChain,
}

/// Legs and economics proposed by a generator, before identity is assigned.
#[derive(Debug, Clone)]
pub struct SignalProposal {
    pub kind: SignalKind,
    pub legs: Vec<Leg>,
    pub target_premium: f64,
}

/// Trait for signal generators.
///
/// Implementations must be deterministic: the same snapshot always yields the
/// same proposal.
pub trait SignalGenerator: Send + Sync {
    /// Strategy identifier recorded on every signal (e.g. "rsi_credit_spread").
    fn name(&self) -> &str;

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Option<SignalProposal>;
}

pub struct SignalPipeline {
    generator: Box<dyn SignalGenerator>,
}

impl SignalPipeline {
    pub fn new(generator: Box<dyn SignalGenerator>) -> Self {
        Self { generator }
    }

    pub fn strategy(&self) -> &str {
        self.generator.name()
    }

    /// Evaluate one symbol. Returns `None` when the strategy has no trade.
    pub fn evaluate(&self, snapshot: &MarketSnapshot<'_>, ids: &mut IdGen) -> Option<Signal> {
        let proposal = self.generator.evaluate(snapshot)?;
        Some(Signal {
            id: ids.next_signal_id(),
            symbol: snapshot.symbol.to_string(),
            strategy: self.generator.name().to_string(),
            kind: proposal.kind,
            legs: proposal.legs,
            target_premium: proposal.target_premium,
            generated_at: snapshot.as_of,
        })
    }
}

impl std::fmt::Debug for SignalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalPipeline")
            .field("strategy", &self.generator.name())
            .finish()
    }
}
