//! Market data abstractions

use crate::core::error::PipelineError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bar of a monthly price series. `datetime` starts with `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub datetime: String,
    pub close: Decimal,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest traded price of `ticker`, in USD.
    async fn get_current_price(&self, ticker: &str) -> Result<Decimal, PipelineError>;

    /// Monthly closes of `ticker` between `start` and `end`, inclusive.
    async fn get_monthly_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, PipelineError>;
}
