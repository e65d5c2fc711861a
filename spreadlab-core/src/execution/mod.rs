//! Execution: signal-to-position routing and live order submission.

pub mod broker;
pub mod coordinator;

pub use broker::{BrokerError, Brokerage, ExecutionMode};
pub use coordinator::{EntryOutcome, ExecutionCoordinator, ExitOutcome, MarketContext};
