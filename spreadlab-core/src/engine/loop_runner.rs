//! Timestamp-by-timestamp simulation loop.
//!
//! Five phases per timestamp:
//! 1. Mark: refresh open positions from the current chains
//! 2. Exit: execute exits flagged at an earlier timestamp (rejected exits retry)
//! 3. Manage: settle expirations, flag new exits, timestamp stop breaches
//! 4. Scan: run the signal pipeline per ranked symbol, route signals to the coordinator
//! 5. Gap: if the step to the next timestamp crosses a closed market, apply gaps
//!    to positions already past their stop
//!
//! After the last timestamp every open position is closed-at-end, valued at
//! its last mark and kept out of fill and exit statistics.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use thiserror::Error;

use super::position_manager::{ExitSignal, PositionManager};
use super::state::{EngineState, RunResult};
use crate::calendar::MarketCalendar;
use crate::config::{ConfigError, SimulationConfig};
use crate::data::{DataError, MarketDataSource, SymbolSource};
use crate::domain::{OptionChain, RunId};
use crate::execution::{EntryOutcome, ExecutionCoordinator, ExecutionMode, ExitOutcome, MarketContext};
use crate::models::GapRiskModel;
use crate::rng::{RandomSource, RngHierarchy};
use crate::signals::{MarketSnapshot, RsiCreditSpread, SignalPipeline};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("timestamps out of order at index {index}: {current} follows {previous}")]
    UnorderedTimestamps {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
}

/// One simulation run. Owns its models, random source and (per run) state.
pub struct Simulation {
    config: SimulationConfig,
    pipeline: SignalPipeline,
    coordinator: ExecutionCoordinator,
    gap_model: GapRiskModel,
    positions: PositionManager,
    rng: Box<dyn RandomSource>,
}

impl Simulation {
    /// Fails only on an invalid configuration.
    pub fn new(
        config: SimulationConfig,
        pipeline: SignalPipeline,
        mode: ExecutionMode,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let calendar = MarketCalendar::new(&config.calendar);
        Ok(Self {
            coordinator: ExecutionCoordinator::new(&config, mode),
            gap_model: GapRiskModel::new(config.gap.clone(), calendar),
            positions: PositionManager::new(config.exits.clone()),
            pipeline,
            rng,
            config,
        })
    }

    /// Backtest with the RSI credit-spread strategy and fill draws seeded
    /// from the config seed and `run_id`.
    pub fn backtest(config: SimulationConfig, run_id: &RunId) -> Result<Self, SimulationError> {
        let pipeline = SignalPipeline::new(Box::new(RsiCreditSpread::new(config.strategy.clone())));
        let rng = RngHierarchy::new(config.seed).source_for(run_id, "fills");
        Self::new(config, pipeline, ExecutionMode::Backtest, Box::new(rng))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run over `timestamps`, which must be non-decreasing.
    pub fn run(
        &mut self,
        timestamps: &[NaiveDateTime],
        source: &dyn MarketDataSource,
        screener: &dyn SymbolSource,
    ) -> Result<RunResult, SimulationError> {
        if let Some(index) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(SimulationError::UnorderedTimestamps {
                index: index + 1,
                previous: timestamps[index],
                current: timestamps[index + 1],
            });
        }

        tracing::info!(
            strategy = self.pipeline.strategy(),
            timestamps = timestamps.len(),
            mode = ?self.coordinator.mode(),
            "simulation started"
        );

        let mut state = EngineState::new(self.config.initial_equity, self.config.default_volatility_index);

        for (i, &t) in timestamps.iter().enumerate() {
            self.step(&mut state, t, timestamps.get(i + 1).copied(), source, screener);
        }

        // ─── Terminal ───
        if let Some(&last) = timestamps.last() {
            for pos in &mut state.open {
                pos.close_at_end(last);
                state.metrics.record_close_at_end(pos.realized_pnl.unwrap_or(0.0));
            }
            state.sweep_closed();
        }

        let result = RunResult::from_state(state, timestamps.len());
        tracing::info!(
            fills = result.metrics.fills,
            exits = result.metrics.exits,
            rejections = result.metrics.total_rejections(),
            gap_events = result.metrics.gap_events,
            realized_pnl = result.metrics.realized_pnl,
            "simulation finished"
        );
        Ok(result)
    }

    fn step(
        &mut self,
        state: &mut EngineState,
        t: NaiveDateTime,
        next: Option<NaiveDateTime>,
        source: &dyn MarketDataSource,
        screener: &dyn SymbolSource,
    ) {
        match source.fetch_volatility_index(t) {
            Ok(Some(level)) => state.volatility_index = level,
            Ok(None) => {}
            Err(e) => tracing::warn!(%t, error = %e, "volatility index unavailable, keeping last level"),
        }
        let mut chains = ChainCache::default();

        // ─── Phase 1: Mark ───
        for pos in &mut state.open {
            if let Some(chain) = chains.get(source, &pos.symbol, t, &mut state.metrics.data_unavailable) {
                pos.refresh_marks(chain);
            }
        }

        // ─── Phase 2: Exit ───
        for pos in &mut state.open {
            let Some(reason) = pos.pending_exit else {
                continue;
            };
            let market = MarketContext {
                timestamp: t,
                volatility_index: state.volatility_index,
                underlying_price: pos.last_underlying,
            };
            match self.coordinator.execute_exit(pos, reason, &market, self.rng.as_mut()) {
                ExitOutcome::Closed { realized_pnl, .. } => {
                    state
                        .metrics
                        .record_close(realized_pnl, pos.entry_commission + pos.exit_commission);
                }
                ExitOutcome::Rejected(record) => {
                    state.metrics.record_rejection(record.reason);
                    state.rejections.push(record);
                }
            }
        }
        state.sweep_closed();

        // ─── Phase 3: Manage ───
        for pos in &mut state.open {
            let was_pending = pos.pending_exit.is_some();
            match self.positions.update(pos, t) {
                ExitSignal::Settle => {
                    let underlying = pos.last_underlying;
                    let pnl = self.coordinator.settle_expiration(pos, underlying, t);
                    state.metrics.record_close(pnl, pos.entry_commission);
                }
                ExitSignal::Exit(reason) if !was_pending => {
                    tracing::debug!(position = %pos.id, ?reason, %t, "exit flagged");
                }
                ExitSignal::Exit(_) | ExitSignal::Hold => {}
            }
        }
        state.sweep_closed();

        // ─── Phase 4: Scan ───
        for ranked in screener.ranked_symbols(t) {
            let symbol = ranked.symbol.as_str();
            state.metrics.scans += 1;
            let closes = match source.fetch_indicator_history(symbol, t) {
                Ok(closes) => closes,
                Err(e) => {
                    skip_symbol(&e, &mut state.metrics.data_unavailable);
                    continue;
                }
            };
            let Some(chain) = chains.get(source, symbol, t, &mut state.metrics.data_unavailable) else {
                continue;
            };
            let snapshot = MarketSnapshot {
                symbol,
                as_of: t,
                closes: &closes,
                chain,
            };
            let Some(signal) = self.pipeline.evaluate(&snapshot, &mut state.ids) else {
                continue;
            };
            state.metrics.signals_generated += 1;

            let market = MarketContext {
                timestamp: t,
                volatility_index: state.volatility_index,
                underlying_price: chain.underlying_price,
            };
            let portfolio = state.portfolio_state();
            match self
                .coordinator
                .execute_entry(signal, &portfolio, &market, self.rng.as_mut(), &mut state.ids)
            {
                EntryOutcome::Executed(position) => {
                    state.metrics.fills += 1;
                    state.open.push(position);
                }
                EntryOutcome::Rejected(record) => state.record_rejection(record),
            }
        }

        // ─── Phase 5: Gap ───
        if let Some(next) = next {
            if self.gap_model.should_check(t, next) {
                for pos in &mut state.open {
                    if let Some(event) = self.gap_model.apply_gap(pos, t, next) {
                        tracing::debug!(
                            position = %pos.id,
                            trigger = ?event.trigger,
                            gap_fraction = event.gap_fraction,
                            "gap applied"
                        );
                        state.metrics.gap_events += 1;
                        state.gap_events.push(event);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("pipeline", &self.pipeline)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

fn skip_symbol(error: &DataError, counter: &mut u64) {
    *counter += 1;
    if error.is_recoverable() {
        tracing::debug!(error = %error, "symbol skipped this pass");
    } else {
        tracing::warn!(error = %error, "symbol skipped this pass");
    }
}

/// Chains fetched at most once per symbol per timestamp.
#[derive(Default)]
struct ChainCache {
    chains: HashMap<String, Option<OptionChain>>,
}

impl ChainCache {
    fn get(
        &mut self,
        source: &dyn MarketDataSource,
        symbol: &str,
        t: NaiveDateTime,
        unavailable: &mut u64,
    ) -> Option<&OptionChain> {
        self.chains
            .entry(symbol.to_string())
            .or_insert_with(|| match source.fetch_option_chain(symbol, t) {
                Ok(chain) => Some(chain),
                Err(e) => {
                    skip_symbol(&e, unavailable);
                    None
                }
            })
            .as_ref()
    }
}
