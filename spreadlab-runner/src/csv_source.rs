//! CSV-backed market data.
//!
//! A data directory holds:
//! - `chains.csv`: `timestamp,symbol,underlying_price,expiration,strike,right,bid,ask,open_interest,volume,iv,delta`
//! - `prices.csv`: `timestamp,symbol,close`
//! - `vix.csv` (optional): `timestamp,vix`
//!
//! Timestamps are ISO-8601 local datetimes (`2024-03-15T12:00:00`); `right`
//! is `P`/`C` or `put`/`call`; `volume` may be empty. Rows sharing a symbol
//! and timestamp form one chain snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use spreadlab_core::data::{DataError, InMemorySource};
use spreadlab_core::domain::{OptionChain, OptionContract, OptionQuote, OptionRight};

pub const CHAINS_FILE: &str = "chains.csv";
pub const PRICES_FILE: &str = "prices.csv";
pub const VIX_FILE: &str = "vix.csv";

#[derive(Debug, Deserialize)]
struct ChainRow {
    timestamp: NaiveDateTime,
    symbol: String,
    underlying_price: f64,
    expiration: NaiveDate,
    strike: f64,
    right: String,
    bid: f64,
    ask: f64,
    open_interest: u64,
    volume: Option<f64>,
    iv: f64,
    delta: f64,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    timestamp: NaiveDateTime,
    symbol: String,
    close: f64,
}

#[derive(Debug, Deserialize)]
struct VixRow {
    timestamp: NaiveDateTime,
    vix: f64,
}

fn parse_right(raw: &str) -> Option<OptionRight> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "p" | "put" => Some(OptionRight::Put),
        "c" | "call" => Some(OptionRight::Call),
        _ => None,
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Io(format!("{}: {e}", path.display())))?;
    let rows = reader
        .deserialize()
        .enumerate()
        // header is line 1
        .map(|(i, row)| row.map_err(|e| DataError::Malformed(format!("{} line {}: {e}", path.display(), i + 2))))
        .collect();
    rows
}

/// Read `chains.csv` into snapshots keyed by (symbol, timestamp).
pub fn read_chains(path: &Path) -> Result<Vec<OptionChain>, DataError> {
    let mut chains: BTreeMap<(String, NaiveDateTime), OptionChain> = BTreeMap::new();
    for (i, row) in read_rows::<ChainRow>(path)?.into_iter().enumerate() {
        let right = parse_right(&row.right).ok_or_else(|| {
            DataError::Malformed(format!(
                "{} line {}: unknown option right {:?}",
                path.display(),
                i + 2,
                row.right
            ))
        })?;
        let quote = OptionQuote {
            contract: OptionContract::new(row.symbol.as_str(), row.expiration, row.strike, right),
            bid: row.bid,
            ask: row.ask,
            open_interest: row.open_interest,
            avg_daily_volume: row.volume,
            implied_volatility: row.iv,
            delta: row.delta,
        };
        chains
            .entry((row.symbol.clone(), row.timestamp))
            .or_insert_with(|| OptionChain {
                symbol: row.symbol,
                as_of: row.timestamp,
                underlying_price: row.underlying_price,
                quotes: Vec::new(),
            })
            .quotes
            .push(quote);
    }
    Ok(chains.into_values().collect())
}

/// Load a data directory into an in-memory source.
pub fn load_data_dir(dir: &Path) -> Result<InMemorySource, DataError> {
    let mut source = InMemorySource::new();

    let chains = read_chains(&dir.join(CHAINS_FILE))?;
    let chain_count = chains.len();
    for chain in chains {
        source.insert_chain(chain);
    }

    let prices: Vec<PriceRow> = read_rows(&dir.join(PRICES_FILE))?;
    for row in &prices {
        source.insert_close(&row.symbol, row.timestamp, row.close);
    }

    let vix_path = dir.join(VIX_FILE);
    let vix_rows = if vix_path.exists() {
        let rows: Vec<VixRow> = read_rows(&vix_path)?;
        for row in &rows {
            source.insert_vix(row.timestamp, row.vix);
        }
        rows.len()
    } else {
        0
    };

    tracing::info!(
        dir = %dir.display(),
        chains = chain_count,
        closes = prices.len(),
        vix = vix_rows,
        "market data loaded"
    );
    Ok(source)
}
