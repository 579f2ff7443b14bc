use super::util::{endpoint, http_client};
use crate::core::currency::ExchangeRateProvider;
use crate::core::error::PipelineError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const USD_MXN_SYMBOL: &str = "USDMXN=X";

/// Days searched after the requested date, so weekends and holidays still
/// resolve to the next published close.
const LOOKAHEAD_DAYS: u64 = 5;

/// Historical USD/MXN closes from the Yahoo Finance chart API.
pub struct YahooRateProvider {
    base_url: String,
    client: Client,
}

impl YahooRateProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(YahooRateProvider {
            base_url: base_url.to_string(),
            client: http_client(Duration::from_secs(30))?,
        })
    }
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

/// First published close in the chart window.
fn first_close(item: &ChartItem) -> Option<f64> {
    item.timestamp.as_ref()?;
    item.indicators
        .as_ref()?
        .quote
        .first()?
        .close
        .as_ref()?
        .iter()
        .flatten()
        .copied()
        .find(|c| *c > 0.0)
}

fn unix_start_of(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[async_trait]
impl ExchangeRateProvider for YahooRateProvider {
    #[instrument(name = "YahooRateFetch", skip(self), fields(symbol = USD_MXN_SYMBOL))]
    async fn get_usd_mxn_rate(&self, date: NaiveDate) -> Result<Option<Decimal>, PipelineError> {
        let until = date.checked_add_days(Days::new(LOOKAHEAD_DAYS)).unwrap_or(date);
        let period1 = unix_start_of(date).to_string();
        let period2 = unix_start_of(until).to_string();
        let url = endpoint(
            &self.base_url,
            &format!("/v8/finance/chart/{USD_MXN_SYMBOL}"),
            &[
                ("period1", &period1),
                ("period2", &period2),
                ("interval", "1d"),
            ],
        )?;
        debug!("Requesting currency rate from {}", url);

        let response = self.client.get(url).send().await?;
        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                debug!("No chart for the requested window");
                return Ok(None);
            }
            s => {
                return Err(PipelineError::Transient(format!(
                    "HTTP error: {s} for currency pair: {USD_MXN_SYMBOL}"
                )));
            }
        }

        let data: ChartResponse = response.json().await?;
        let rate = data
            .chart
            .result
            .unwrap_or_default()
            .first()
            .and_then(first_close)
            .and_then(Decimal::from_f64)
            .map(|r| r.round_dp(6));
        debug!(?rate, %date, "Resolved USD/MXN rate");
        Ok(rate)
    }
}
