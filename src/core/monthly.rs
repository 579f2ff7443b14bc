//! Month-by-month unrealized gain across a user's holdings.
//!
//! Each distinct ticker costs exactly one market-data request: the series is
//! fetched once from the earliest purchase month of that ticker up to today and
//! reused for every holding of the ticker.

use crate::core::UserId;
use crate::core::error::PipelineError;
use crate::core::price::{MarketDataProvider, SeriesPoint};
use crate::core::records::{Holding, RecordStore};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// A calendar month, ordered chronologically and rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            MonthKey {
                year: self.year + 1,
                month: 1,
            }
        } else {
            MonthKey {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    /// Reads the `YYYY-MM` prefix of a date or datetime string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = s.get(..7).ok_or_else(|| format!("Invalid month: {s}"))?;
        let (year, month) = prefix
            .split_once('-')
            .ok_or_else(|| format!("Invalid month: {s}"))?;
        let year: i32 = year.parse().map_err(|_| format!("Invalid year in: {s}"))?;
        let month: u32 = month.parse().map_err(|_| format!("Invalid month in: {s}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("Month out of range in: {s}"));
        }
        Ok(MonthKey { year, month })
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Aggregate unrealized gain per month, ascending.
pub type MonthlyGainSeries = BTreeMap<MonthKey, Decimal>;

/// A month's closing price of one ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub month: MonthKey,
    pub close: Decimal,
}

impl PricePoint {
    fn from_series(point: &SeriesPoint) -> Option<Self> {
        match point.datetime.parse() {
            Ok(month) => Some(PricePoint {
                month,
                close: point.close,
            }),
            Err(e) => {
                debug!("Skipping series point: {}", e);
                None
            }
        }
    }
}

/// Monthly closes per ticker, built once per aggregation call.
type SeriesCache = HashMap<String, HashMap<MonthKey, Decimal>>;

/// Builds the monthly gain series of `user` as of `today`.
///
/// Returns an empty series when the user has no holdings. Months without a
/// closing price contribute nothing.
#[instrument(name = "MonthlyGainSeries", skip(records, market))]
pub async fn compute_monthly_gain_series(
    records: &dyn RecordStore,
    market: &dyn MarketDataProvider,
    user: UserId,
    today: NaiveDate,
) -> Result<MonthlyGainSeries, PipelineError> {
    let holdings = records.holdings(user).await?;
    if holdings.is_empty() {
        debug!("No holdings found");
        return Ok(MonthlyGainSeries::new());
    }

    let mut by_ticker: BTreeMap<&str, Vec<&Holding>> = BTreeMap::new();
    let mut earliest: HashMap<&str, MonthKey> = HashMap::new();
    for holding in &holdings {
        let ticker = holding.ticker.as_str();
        by_ticker.entry(ticker).or_default().push(holding);
        let start = MonthKey::of(holding.purchase_date);
        earliest
            .entry(ticker)
            .and_modify(|m| *m = (*m).min(start))
            .or_insert(start);
    }

    let mut cache = SeriesCache::new();
    for ticker in by_ticker.keys() {
        let start = earliest
            .get(ticker)
            .and_then(MonthKey::first_day)
            .unwrap_or(today);
        let series = market.get_monthly_series(ticker, start, today).await?;
        let closes = series
            .iter()
            .filter_map(PricePoint::from_series)
            .map(|p| (p.month, p.close))
            .collect();
        cache.insert(ticker.to_string(), closes);
    }

    let current = MonthKey::of(today);
    let mut gains = MonthlyGainSeries::new();
    for (ticker, group) in &by_ticker {
        let Some(closes) = cache.get(*ticker) else {
            continue;
        };
        for holding in group {
            accumulate(&mut gains, holding, closes, current);
        }
    }

    info!(
        tickers = by_ticker.len(),
        holdings = holdings.len(),
        months = gains.len(),
        "Monthly gain series computed"
    );
    Ok(gains)
}

fn accumulate(
    gains: &mut MonthlyGainSeries,
    holding: &Holding,
    closes: &HashMap<MonthKey, Decimal>,
    current: MonthKey,
) {
    let cost = holding.quantity * holding.purchase_price;
    let mut month = MonthKey::of(holding.purchase_date);
    while month <= current {
        if let Some(close) = closes.get(&month) {
            let gain = holding.quantity * *close - cost;
            *gains.entry(month).or_insert(Decimal::ZERO) += gain;
        }
        month = month.next();
    }
}
