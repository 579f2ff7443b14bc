//! Currency conversion abstractions

use crate::core::error::PipelineError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// MXN per USD on `date`, or `None` when no rate was published.
    async fn get_usd_mxn_rate(&self, date: NaiveDate) -> Result<Option<Decimal>, PipelineError>;
}
