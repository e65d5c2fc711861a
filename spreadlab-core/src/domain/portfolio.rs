use serde::{Deserialize, Serialize};

/// Point-in-time portfolio view handed to the risk manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Initial capital plus realized and unrealized P&L.
    pub equity: f64,
    /// Cash not committed as margin to open positions.
    pub buying_power: f64,
    pub open_positions: usize,
    pub committed_capital: f64,
}

impl PortfolioState {
    pub fn flat(equity: f64) -> Self {
        Self {
            equity,
            buying_power: equity,
            open_positions: 0,
            committed_capital: 0.0,
        }
    }
}
