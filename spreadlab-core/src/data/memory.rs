//! In-memory market data, keyed by symbol and timestamp.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::source::{DataError, MarketDataSource};
use crate::domain::OptionChain;

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    chains: HashMap<String, BTreeMap<NaiveDateTime, OptionChain>>,
    closes: HashMap<String, BTreeMap<NaiveDateTime, f64>>,
    vix: BTreeMap<NaiveDateTime, f64>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chain snapshot, replacing any existing one at the same timestamp.
    pub fn insert_chain(&mut self, chain: OptionChain) {
        self.chains
            .entry(chain.symbol.clone())
            .or_default()
            .insert(chain.as_of, chain);
    }

    pub fn insert_close(&mut self, symbol: &str, at: NaiveDateTime, close: f64) {
        self.closes.entry(symbol.to_string()).or_default().insert(at, close);
    }

    pub fn insert_vix(&mut self, at: NaiveDateTime, level: f64) {
        self.vix.insert(at, level);
    }

    /// Every timestamp with at least one chain snapshot, ascending.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        let all: BTreeSet<NaiveDateTime> = self
            .chains
            .values()
            .flat_map(|by_ts| by_ts.keys().copied())
            .collect();
        all.into_iter().collect()
    }

    /// Symbols with chain data, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.chains.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn chain_count(&self) -> usize {
        self.chains.values().map(BTreeMap::len).sum()
    }
}

impl MarketDataSource for InMemorySource {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn fetch_option_chain(&self, symbol: &str, as_of: NaiveDateTime) -> Result<OptionChain, DataError> {
        self.chains
            .get(symbol)
            .and_then(|by_ts| by_ts.get(&as_of))
            .cloned()
            .ok_or_else(|| DataError::Unavailable {
                symbol: symbol.to_string(),
                as_of,
            })
    }

    fn fetch_indicator_history(&self, symbol: &str, as_of: NaiveDateTime) -> Result<Vec<f64>, DataError> {
        let history: Vec<f64> = self
            .closes
            .get(symbol)
            .map(|by_ts| by_ts.range(..=as_of).map(|(_, c)| *c).collect())
            .unwrap_or_default();
        if history.is_empty() {
            return Err(DataError::Unavailable {
                symbol: symbol.to_string(),
                as_of,
            });
        }
        Ok(history)
    }

    /// Latest level at or before `as_of`.
    fn fetch_volatility_index(&self, as_of: NaiveDateTime) -> Result<Option<f64>, DataError> {
        Ok(self.vix.range(..=as_of).next_back().map(|(_, v)| *v))
    }

    fn may_block(&self) -> bool {
        false
    }
}
