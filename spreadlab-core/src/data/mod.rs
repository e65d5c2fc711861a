//! Market data access: source trait, in-memory store, fetch timeouts, screeners.

pub mod memory;
pub mod screener;
pub mod source;
pub mod timed;

pub use memory::InMemorySource;
pub use screener::{RankedSymbol, StaticScreener, SymbolSource};
pub use source::{DataError, MarketDataSource};
pub use timed::TimedSource;
