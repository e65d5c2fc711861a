//! Symbol sources. The loop consumes ranked symbols as an opaque input queue.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSymbol {
    pub symbol: String,
    /// Higher is scanned first.
    pub score: f64,
}

pub trait SymbolSource: Send + Sync {
    /// Candidate symbols for one scan, highest score first.
    fn ranked_symbols(&self, as_of: NaiveDateTime) -> Vec<RankedSymbol>;
}

/// Fixed universe. Earlier symbols rank higher.
#[derive(Debug, Clone)]
pub struct StaticScreener {
    symbols: Vec<RankedSymbol>,
}

impl StaticScreener {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = symbols.into_iter().map(Into::into).collect();
        let n = names.len();
        let symbols = names
            .into_iter()
            .enumerate()
            .map(|(i, symbol)| RankedSymbol {
                symbol,
                score: (n - i) as f64,
            })
            .collect();
        Self { symbols }
    }

    pub fn with_scores(mut symbols: Vec<RankedSymbol>) -> Self {
        symbols.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.symbol.cmp(&b.symbol)));
        Self { symbols }
    }
}

impl SymbolSource for StaticScreener {
    fn ranked_symbols(&self, _as_of: NaiveDateTime) -> Vec<RankedSymbol> {
        self.symbols.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn list_order_is_rank_order() {
        let screener = StaticScreener::new(["SPY", "QQQ", "IWM"]);
        let ranked: Vec<String> = screener.ranked_symbols(ts()).into_iter().map(|r| r.symbol).collect();
        assert_eq!(ranked, vec!["SPY", "QQQ", "IWM"]);
    }

    #[test]
    fn scores_sort_descending_with_stable_ties() {
        let screener = StaticScreener::with_scores(vec![
            RankedSymbol { symbol: "QQQ".into(), score: 1.0 },
            RankedSymbol { symbol: "SPY".into(), score: 2.0 },
            RankedSymbol { symbol: "IWM".into(), score: 1.0 },
        ]);
        let ranked: Vec<String> = screener.ranked_symbols(ts()).into_iter().map(|r| r.symbol).collect();
        assert_eq!(ranked, vec!["SPY", "IWM", "QQQ"]);
    }
}
