//! Per-run counters and P&L aggregates.
//!
//! Owned by exactly one simulation run and created fresh at run start.
//! Terminal closed-at-end valuations are tracked apart from real fills.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::RejectionReason;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Symbol evaluations attempted by the signal pipeline.
    pub scans: u64,
    pub signals_generated: u64,
    /// Entry orders filled.
    pub fills: u64,
    /// Positions closed by a real exit or expiration.
    pub exits: u64,
    pub rejections: BTreeMap<RejectionReason, u64>,
    pub gap_events: u64,
    /// Fetches skipped because data was missing or timed out.
    pub data_unavailable: u64,
    /// Realized P&L of real closes, net of commission.
    pub realized_pnl: f64,
    pub commissions: f64,
    pub wins: u64,
    pub losses: u64,
    /// Positions still open when the run ended.
    pub closed_at_end: u64,
    /// Mark-to-market P&L of closed-at-end positions.
    pub closed_at_end_pnl: f64,
}

impl RunMetrics {
    pub fn record_rejection(&mut self, reason: RejectionReason) {
        *self.rejections.entry(reason).or_default() += 1;
    }

    pub fn rejections_for(&self, reason: RejectionReason) -> u64 {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_rejections(&self) -> u64 {
        self.rejections.values().sum()
    }

    pub fn record_close(&mut self, realized_pnl: f64, commission: f64) {
        self.exits += 1;
        self.realized_pnl += realized_pnl;
        self.commissions += commission;
        if realized_pnl > 0.0 {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
    }

    pub fn record_close_at_end(&mut self, pnl: f64) {
        self.closed_at_end += 1;
        self.closed_at_end_pnl += pnl;
    }

    /// Realized plus closed-at-end P&L.
    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.closed_at_end_pnl
    }

    /// Fraction of real closes with positive P&L.
    pub fn win_rate(&self) -> Option<f64> {
        let n = self.wins + self.losses;
        (n > 0).then(|| self.wins as f64 / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_breakdown() {
        let mut m = RunMetrics::default();
        m.record_rejection(RejectionReason::Liquidity);
        m.record_rejection(RejectionReason::Liquidity);
        m.record_rejection(RejectionReason::RiskLimit);
        assert_eq!(m.rejections_for(RejectionReason::Liquidity), 2);
        assert_eq!(m.rejections_for(RejectionReason::Spread), 0);
        assert_eq!(m.total_rejections(), 3);
    }

    #[test]
    fn closed_at_end_is_not_an_exit() {
        let mut m = RunMetrics::default();
        m.record_close(50.0, 4.0);
        m.record_close_at_end(-20.0);
        assert_eq!(m.exits, 1);
        assert_eq!(m.closed_at_end, 1);
        assert_eq!(m.win_rate(), Some(1.0));
        assert!((m.total_pnl() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn serializes_reasons_as_keys() {
        let mut m = RunMetrics::default();
        m.record_rejection(RejectionReason::FillProbability);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["rejections"]["fill_probability"], 1);
    }
}
