//! Market data source trait and structured error types.
//!
//! The `MarketDataSource` trait abstracts over brokerage feeds, CSV archives
//! and in-memory fixtures so the simulation loop never knows where chains
//! come from. Any fetch may fail; the loop treats failure as "no signal for
//! this symbol this pass", never as fatal.

use chrono::NaiveDateTime;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::OptionChain;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("no data for {symbol} at {as_of}")]
    Unavailable { symbol: String, as_of: NaiveDateTime },

    #[error("fetch for {symbol} timed out after {timeout_ms} ms")]
    Timeout { symbol: String, timeout_ms: u64 },

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DataError {
    /// Unavailable and timed-out fetches skip the symbol for one pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Option chain and price history provider.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Chain snapshot for `symbol` at exactly `as_of`.
    fn fetch_option_chain(&self, symbol: &str, as_of: NaiveDateTime) -> Result<OptionChain, DataError>;

    /// Close history up to and including `as_of`, oldest first.
    fn fetch_indicator_history(&self, symbol: &str, as_of: NaiveDateTime) -> Result<Vec<f64>, DataError>;

    /// Volatility index level at `as_of`, when the source carries one.
    fn fetch_volatility_index(&self, _as_of: NaiveDateTime) -> Result<Option<f64>, DataError> {
        Ok(None)
    }

    /// Whether a fetch can stall (network, disk, remote API). Sources that
    /// answer from memory return false and are never wrapped in a timeout.
    fn may_block(&self) -> bool {
        true
    }
}

impl<S: MarketDataSource + ?Sized> MarketDataSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_option_chain(&self, symbol: &str, as_of: NaiveDateTime) -> Result<OptionChain, DataError> {
        (**self).fetch_option_chain(symbol, as_of)
    }

    fn fetch_indicator_history(&self, symbol: &str, as_of: NaiveDateTime) -> Result<Vec<f64>, DataError> {
        (**self).fetch_indicator_history(symbol, as_of)
    }

    fn fetch_volatility_index(&self, as_of: NaiveDateTime) -> Result<Option<f64>, DataError> {
        (**self).fetch_volatility_index(as_of)
    }

    fn may_block(&self) -> bool {
        (**self).may_block()
    }
}
