//! Twelve Data market data.

use super::util::{endpoint, http_client};
use crate::core::error::PipelineError;
use crate::core::price::{MarketDataProvider, SeriesPoint};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Error code returned when the requested window holds no bars.
const NO_DATA_CODE: u16 = 400;

pub struct TwelveDataProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

/// Twelve Data answers errors with HTTP 200 and a `status` field.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Ok(T),
    Error(ApiError),
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    values: Vec<SeriesPoint>,
}

impl TwelveDataProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(TwelveDataProvider {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            client: http_client(Duration::from_secs(30))?,
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, PipelineError> {
        let mut all: Vec<(&str, &str)> = params.to_vec();
        all.push(("apikey", self.api_key.as_str()));
        endpoint(&self.base_url, path, &all)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Envelope<T>, PipelineError> {
        debug!("Requesting {}", url.path());
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::Transient(format!(
                "Market data returned HTTP {}",
                response.status()
            )));
        }
        Ok(response.json::<Envelope<T>>().await?)
    }
}

fn api_error(ticker: &str, e: ApiError) -> PipelineError {
    PipelineError::Transient(format!(
        "Market data error for {ticker}: {}",
        e.message.unwrap_or_else(|| "unknown error".to_string())
    ))
}

#[async_trait]
impl MarketDataProvider for TwelveDataProvider {
    #[instrument(name = "TwelveDataPrice", skip(self))]
    async fn get_current_price(&self, ticker: &str) -> Result<Decimal, PipelineError> {
        let url = self.url("/price", &[("symbol", ticker)])?;
        match self.fetch::<PriceResponse>(url).await? {
            Envelope::Ok(p) => Ok(p.price),
            Envelope::Error(e) => Err(api_error(ticker, e)),
        }
    }

    #[instrument(name = "TwelveDataSeries", skip(self))]
    async fn get_monthly_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, PipelineError> {
        let start = start.to_string();
        let end = end.to_string();
        let url = self.url(
            "/time_series",
            &[
                ("symbol", ticker),
                ("interval", "1month"),
                ("start_date", &start),
                ("end_date", &end),
                ("order", "ASC"),
            ],
        )?;
        match self.fetch::<TimeSeriesResponse>(url).await? {
            Envelope::Ok(series) => {
                debug!(points = series.values.len(), "Fetched monthly series");
                Ok(series.values)
            }
            Envelope::Error(e) if e.code == Some(NO_DATA_CODE) => {
                debug!(message = ?e.message, "No monthly data in window");
                Ok(Vec::new())
            }
            Envelope::Error(e) => Err(api_error(ticker, e)),
        }
    }
}
