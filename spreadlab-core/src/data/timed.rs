//! Fetch timeouts.
//!
//! `TimedSource` runs each fetch on a worker thread and waits at most
//! `timeout` for the answer. A late fetch becomes `DataError::Timeout`; the
//! worker is left to finish on its own and its result is discarded.

use chrono::NaiveDateTime;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::source::{DataError, MarketDataSource};
use crate::domain::OptionChain;

pub struct TimedSource<S: ?Sized> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S: MarketDataSource + ?Sized + 'static> TimedSource<S> {
    pub fn new(inner: Arc<S>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn bounded<T, F>(&self, symbol: &str, fetch: F) -> Result<T, DataError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, DataError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("spreadlab-fetch".into())
            .spawn(move || {
                // receiver may be gone after a timeout
                let _ = tx.send(fetch(&*inner));
            });
        if let Err(e) = spawned {
            return Err(DataError::Io(format!("spawn fetch worker: {e}")));
        }
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(DataError::Io(format!("fetch worker for {symbol} exited without a result")))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(symbol, timeout_ms = self.timeout.as_millis() as u64, "data fetch timed out");
                Err(DataError::Timeout {
                    symbol: symbol.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl<S: MarketDataSource + ?Sized + 'static> MarketDataSource for TimedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch_option_chain(&self, symbol: &str, as_of: NaiveDateTime) -> Result<OptionChain, DataError> {
        let sym = symbol.to_string();
        self.bounded(symbol, move |s| s.fetch_option_chain(&sym, as_of))
    }

    fn fetch_indicator_history(&self, symbol: &str, as_of: NaiveDateTime) -> Result<Vec<f64>, DataError> {
        let sym = symbol.to_string();
        self.bounded(symbol, move |s| s.fetch_indicator_history(&sym, as_of))
    }

    fn fetch_volatility_index(&self, as_of: NaiveDateTime) -> Result<Option<f64>, DataError> {
        self.bounded("VIX", move |s| s.fetch_volatility_index(as_of))
    }

    fn may_block(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Slow {
        delay: Duration,
    }

    impl MarketDataSource for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn fetch_option_chain(&self, symbol: &str, as_of: NaiveDateTime) -> Result<OptionChain, DataError> {
            thread::sleep(self.delay);
            Ok(OptionChain {
                symbol: symbol.to_string(),
                as_of,
                underlying_price: 100.0,
                quotes: Vec::new(),
            })
        }

        fn fetch_indicator_history(&self, symbol: &str, as_of: NaiveDateTime) -> Result<Vec<f64>, DataError> {
            Err(DataError::Unavailable {
                symbol: symbol.to_string(),
                as_of,
            })
        }
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn blocking_flag_follows_the_wrapper() {
        let slow = Arc::new(Slow { delay: Duration::ZERO });
        assert!(slow.may_block());
        assert!(!TimedSource::new(slow, Duration::from_secs(1)).may_block());
    }

    #[test]
    fn fast_fetch_passes_through() {
        let src = TimedSource::new(Arc::new(Slow { delay: Duration::ZERO }), Duration::from_secs(5));
        assert_eq!(src.fetch_option_chain("SPY", ts()).unwrap().symbol, "SPY");
        assert!(matches!(
            src.fetch_indicator_history("SPY", ts()),
            Err(DataError::Unavailable { .. })
        ));
        assert_eq!(src.fetch_volatility_index(ts()).unwrap(), None);
    }

    #[test]
    fn slow_fetch_times_out() {
        let src = TimedSource::new(
            Arc::new(Slow {
                delay: Duration::from_millis(500),
            }),
            Duration::from_millis(20),
        );
        let err = src.fetch_option_chain("SPY", ts()).unwrap_err();
        assert_eq!(
            err,
            DataError::Timeout {
                symbol: "SPY".into(),
                timeout_ms: 20
            }
        );
        assert!(err.is_recoverable());
    }
}
