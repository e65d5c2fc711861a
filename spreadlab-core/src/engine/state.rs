//! Mutable run state and the run result.

use serde::{Deserialize, Serialize};

use crate::domain::{GapEvent, IdGen, PortfolioState, Position, RejectionRecord};
use crate::metrics::RunMetrics;

/// State that evolves timestamp by timestamp during one run.
#[derive(Debug)]
pub struct EngineState {
    pub initial_equity: f64,
    pub open: Vec<Position>,
    pub closed: Vec<Position>,
    pub rejections: Vec<RejectionRecord>,
    pub gap_events: Vec<GapEvent>,
    pub metrics: RunMetrics,
    pub ids: IdGen,
    /// Last volatility index level observed; starts at the configured default.
    pub volatility_index: f64,
}

impl EngineState {
    pub fn new(initial_equity: f64, default_volatility_index: f64) -> Self {
        Self {
            initial_equity,
            open: Vec::new(),
            closed: Vec::new(),
            rejections: Vec::new(),
            gap_events: Vec::new(),
            metrics: RunMetrics::default(),
            ids: IdGen::default(),
            volatility_index: default_volatility_index,
        }
    }

    pub fn record_rejection(&mut self, record: RejectionRecord) {
        self.metrics.record_rejection(record.reason);
        self.rejections.push(record);
    }

    /// Portfolio view for the risk manager.
    ///
    /// equity = initial + realized + open mark-to-market (net of entry commission)
    /// buying power = initial + realized - open entry commission - committed capital
    pub fn portfolio_state(&self) -> PortfolioState {
        let committed: f64 = self.open.iter().map(|p| p.capital_requirement).sum();
        let open_commission: f64 = self.open.iter().map(|p| p.entry_commission).sum();
        let unrealized: f64 = self.open.iter().map(Position::unrealized_pnl).sum();
        let settled = self.initial_equity + self.metrics.realized_pnl;
        PortfolioState {
            equity: settled + unrealized - open_commission,
            buying_power: settled - open_commission - committed,
            open_positions: self.open.len(),
            committed_capital: committed,
        }
    }

    /// Move every position that is no longer open from `open` to `closed`.
    pub fn sweep_closed(&mut self) {
        let (still_open, done): (Vec<Position>, Vec<Position>) =
            std::mem::take(&mut self.open).into_iter().partition(Position::is_open);
        self.open = still_open;
        self.closed.extend(done);
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub metrics: RunMetrics,
    /// Every position of the run in close order, closed-at-end positions last.
    pub positions: Vec<Position>,
    pub rejections: Vec<RejectionRecord>,
    pub gap_events: Vec<GapEvent>,
    pub timestamps_processed: usize,
    pub initial_equity: f64,
    pub final_equity: f64,
}

impl RunResult {
    pub(crate) fn from_state(state: EngineState, timestamps_processed: usize) -> Self {
        let final_equity = state.initial_equity + state.metrics.total_pnl();
        Self {
            metrics: state.metrics,
            positions: state.closed,
            rejections: state.rejections,
            gap_events: state.gap_events,
            timestamps_processed,
            initial_equity: state.initial_equity,
            final_equity,
        }
    }
}
