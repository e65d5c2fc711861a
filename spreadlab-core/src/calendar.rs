//! Exchange session calendar.
//!
//! Timestamps are exchange-local. The regular session is `[open, close]` on
//! weekdays that are not holidays; the market is closed at all other times.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ConfigError;
use crate::models::TimeBucket;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    /// Width of the opening and closing liquidity windows.
    pub edge_window_minutes: i64,
    pub holidays: Vec<NaiveDate>,
    /// Earnings dates per underlying.
    pub earnings: BTreeMap<String, Vec<NaiveDate>>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            session_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            edge_window_minutes: 30,
            holidays: Vec::new(),
            earnings: BTreeMap::new(),
        }
    }
}

impl CalendarConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_open >= self.session_close {
            return Err(ConfigError::Invalid {
                field: "calendar.session_open",
                reason: format!(
                    "session open {} is not before close {}",
                    self.session_open, self.session_close
                ),
            });
        }
        let session_minutes = (self.session_close - self.session_open).num_minutes();
        if self.edge_window_minutes < 0 || self.edge_window_minutes * 2 > session_minutes {
            return Err(ConfigError::Invalid {
                field: "calendar.edge_window_minutes",
                reason: format!(
                    "{} does not fit twice in a {session_minutes}-minute session",
                    self.edge_window_minutes
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MarketCalendar {
    open: NaiveTime,
    close: NaiveTime,
    edge_window: Duration,
    holidays: BTreeSet<NaiveDate>,
    earnings: HashMap<String, BTreeSet<NaiveDate>>,
}

impl MarketCalendar {
    pub fn new(config: &CalendarConfig) -> Self {
        Self {
            open: config.session_open,
            close: config.session_close,
            edge_window: Duration::minutes(config.edge_window_minutes),
            holidays: config.holidays.iter().copied().collect(),
            earnings: config
                .earnings
                .iter()
                .map(|(sym, dates)| (sym.clone(), dates.iter().copied().collect()))
                .collect(),
        }
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    pub fn is_open(&self, ts: NaiveDateTime) -> bool {
        self.is_trading_day(ts.date()) && ts.time() >= self.open && ts.time() <= self.close
    }

    pub fn time_bucket(&self, ts: NaiveDateTime) -> TimeBucket {
        if !self.is_open(ts) {
            return TimeBucket::Closed;
        }
        let t = ts.time();
        if t < self.open + self.edge_window {
            TimeBucket::Opening
        } else if t >= self.close - self.edge_window {
            TimeBucket::Closing
        } else {
            TimeBucket::Midday
        }
    }

    /// First session open strictly after `after` and no later than `until`.
    pub fn next_session_open(&self, after: NaiveDateTime, until: NaiveDateTime) -> Option<NaiveDateTime> {
        after
            .date()
            .iter_days()
            .take_while(|d| *d <= until.date())
            .filter(|d| self.is_trading_day(*d))
            .map(|d| d.and_time(self.open))
            .find(|open| *open > after && *open <= until)
    }

    /// Whether the market closes and reopens between `prev` and `next`.
    pub fn crosses_closed_session(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        next > prev && self.next_session_open(prev, next).is_some()
    }

    /// Whether any non-trading calendar day lies in `[prev.date(), next.date())`.
    pub fn spans_non_trading_day(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        prev.date()
            .iter_days()
            .take_while(|d| *d < next.date())
            .any(|d| !self.is_trading_day(d))
    }

    /// Whether `symbol` reports earnings on any date in `[prev.date(), next.date()]`.
    pub fn has_earnings_between(&self, symbol: &str, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        self.earnings
            .get(symbol)
            .is_some_and(|dates| dates.range(prev.date()..=next.date()).next().is_some())
    }
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self::new(&CalendarConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-15 is a Friday.
    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn weekends_and_holidays_are_closed() {
        let cal = MarketCalendar::new(&CalendarConfig {
            holidays: vec![NaiveDate::from_ymd_opt(2024, 3, 29).unwrap()],
            ..Default::default()
        });
        assert!(cal.is_trading_day(at(15, 0, 0).date()));
        assert!(!cal.is_trading_day(at(16, 0, 0).date()));
        assert!(!cal.is_trading_day(at(29, 0, 0).date()));
    }

    #[test]
    fn time_buckets() {
        let cal = MarketCalendar::default();
        assert_eq!(cal.time_bucket(at(15, 9, 30)), TimeBucket::Opening);
        assert_eq!(cal.time_bucket(at(15, 9, 59)), TimeBucket::Opening);
        assert_eq!(cal.time_bucket(at(15, 10, 0)), TimeBucket::Midday);
        assert_eq!(cal.time_bucket(at(15, 15, 30)), TimeBucket::Closing);
        assert_eq!(cal.time_bucket(at(15, 16, 0)), TimeBucket::Closing);
        assert_eq!(cal.time_bucket(at(15, 16, 1)), TimeBucket::Closed);
        assert_eq!(cal.time_bucket(at(16, 12, 0)), TimeBucket::Closed);
    }

    #[test]
    fn intraday_steps_do_not_cross_a_close() {
        let cal = MarketCalendar::default();
        assert!(!cal.crosses_closed_session(at(15, 10, 0), at(15, 15, 0)));
        assert!(!cal.crosses_closed_session(at(15, 9, 30), at(15, 16, 0)));
        assert!(!cal.crosses_closed_session(at(15, 12, 0), at(15, 12, 0)));
    }

    #[test]
    fn overnight_and_weekend_cross() {
        let cal = MarketCalendar::default();
        // Thursday close -> Friday open
        assert!(cal.crosses_closed_session(at(14, 16, 0), at(15, 9, 30)));
        assert!(!cal.spans_non_trading_day(at(14, 16, 0), at(15, 9, 30)));
        // Friday close -> Monday open
        assert!(cal.crosses_closed_session(at(15, 16, 0), at(18, 9, 30)));
        assert!(cal.spans_non_trading_day(at(15, 16, 0), at(18, 9, 30)));
        // daily closes
        assert!(cal.crosses_closed_session(at(14, 16, 0), at(15, 16, 0)));
    }

    #[test]
    fn friday_close_to_saturday_does_not_reopen() {
        let cal = MarketCalendar::default();
        assert!(!cal.crosses_closed_session(at(15, 16, 0), at(16, 12, 0)));
    }

    #[test]
    fn holiday_span_counts_as_non_trading() {
        let cal = MarketCalendar::new(&CalendarConfig {
            holidays: vec![NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()],
            ..Default::default()
        });
        // Tuesday close -> Thursday open over a Wednesday holiday
        assert!(cal.crosses_closed_session(at(12, 16, 0), at(14, 9, 30)));
        assert!(cal.spans_non_trading_day(at(12, 16, 0), at(14, 9, 30)));
    }

    #[test]
    fn earnings_window_is_inclusive() {
        let mut earnings = BTreeMap::new();
        earnings.insert("AAPL".to_string(), vec![NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()]);
        let cal = MarketCalendar::new(&CalendarConfig {
            earnings,
            ..Default::default()
        });
        assert!(cal.has_earnings_between("AAPL", at(14, 16, 0), at(15, 9, 30)));
        assert!(cal.has_earnings_between("AAPL", at(13, 16, 0), at(14, 9, 30)));
        assert!(!cal.has_earnings_between("AAPL", at(15, 16, 0), at(18, 9, 30)));
        assert!(!cal.has_earnings_between("SPY", at(14, 16, 0), at(15, 9, 30)));
    }

    #[test]
    fn inverted_session_rejected() {
        let cfg = CalendarConfig {
            session_open: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            session_close: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
