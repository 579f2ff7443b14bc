//! Scripted collaborators shared by the pipeline tests.

use super::extract::ExtractionAdapter;
use super::image::ImageOptions;
use super::retry::RetryPolicy;
use super::task::TaskContext;
use crate::core::UserId;
use crate::core::currency::ExchangeRateProvider;
use crate::core::error::PipelineError;
use crate::core::extraction::Extractor;
use crate::core::fact::FactMap;
use crate::core::price::{MarketDataProvider, SeriesPoint};
use crate::core::records::RecordStore;
use crate::core::storage::{FileStorage, RemoteFile};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub(crate) fn remote(id: &str, name: &str, mime_type: &str) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
    }
}

pub(crate) fn facts(value: serde_json::Value) -> FactMap {
    value.as_object().cloned().unwrap()
}

#[derive(Default)]
pub(crate) struct FakeStorage {
    pub files: Vec<RemoteFile>,
    pub contents: HashMap<String, Vec<u8>>,
    pub list_error: Option<PipelineError>,
    pub download_error: Option<PipelineError>,
    pub downloads: AtomicUsize,
    pub listed_folders: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn with_files(files: Vec<RemoteFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStorage for FakeStorage {
    async fn list_files(
        &self,
        _user: UserId,
        folder_name: &str,
        mime_types: &[&str],
    ) -> Result<Vec<RemoteFile>, PipelineError> {
        self.listed_folders.lock().unwrap().push(folder_name.to_string());
        if let Some(e) = &self.list_error {
            return Err(e.clone());
        }
        Ok(self
            .files
            .iter()
            .filter(|f| mime_types.is_empty() || mime_types.contains(&f.mime_type.as_str()))
            .cloned()
            .collect())
    }

    async fn get_file_content(
        &self,
        _user: UserId,
        file_id: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.download_error {
            return Err(e.clone());
        }
        Ok(self
            .contents
            .get(file_id)
            .cloned()
            .unwrap_or_else(|| b"%PDF-1.4 test".to_vec()))
    }
}

/// Answers every entry point with the same scripted result.
pub(crate) struct FakeExtractor {
    pub response: Result<FactMap, PipelineError>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(response: Result<FactMap, PipelineError>) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<FactMap, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract_ticket_from_image(&self, _jpeg: &[u8]) -> Result<FactMap, PipelineError> {
        self.answer()
    }
    async fn extract_ticket_from_pdf(&self, _pdf: &[u8]) -> Result<FactMap, PipelineError> {
        self.answer()
    }
    async fn extract_investment_from_image(&self, _jpeg: &[u8]) -> Result<FactMap, PipelineError> {
        self.answer()
    }
    async fn extract_investment_from_pdf(&self, _pdf: &[u8]) -> Result<FactMap, PipelineError> {
        self.answer()
    }
}

pub(crate) struct FixedMarket {
    pub price: Decimal,
}

#[async_trait]
impl MarketDataProvider for FixedMarket {
    async fn get_current_price(&self, _ticker: &str) -> Result<Decimal, PipelineError> {
        Ok(self.price)
    }

    async fn get_monthly_series(
        &self,
        _ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, PipelineError> {
        Ok(Vec::new())
    }
}

pub(crate) struct FixedRates {
    pub rate: Option<Decimal>,
    pub lookups: AtomicUsize,
}

impl FixedRates {
    pub fn new(rate: Option<Decimal>) -> Self {
        Self {
            rate,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExchangeRateProvider for FixedRates {
    async fn get_usd_mxn_rate(&self, _date: NaiveDate) -> Result<Option<Decimal>, PipelineError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rate)
    }
}

pub(crate) fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        delay: Duration::from_millis(1),
    }
}

pub(crate) fn context(
    storage: Arc<FakeStorage>,
    extractor: Arc<FakeExtractor>,
    rates: Arc<FixedRates>,
    records: Arc<dyn RecordStore>,
) -> TaskContext {
    TaskContext {
        storage,
        extraction: ExtractionAdapter::new(extractor, ImageOptions::default()),
        market: Arc::new(FixedMarket { price: d("150") }),
        rates,
        records,
        retry: fast_retry(3),
    }
}
