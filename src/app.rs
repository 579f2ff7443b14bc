//! Entry points exposed to callers: batch dispatch, job polling and the
//! monthly gain series.

use crate::core::UserId;
use crate::core::config::{AppConfig, PipelineConfig};
use crate::core::currency::ExchangeRateProvider;
use crate::core::error::PipelineError;
use crate::core::extraction::Extractor;
use crate::core::monthly::{MonthlyGainSeries, compute_monthly_gain_series};
use crate::core::price::MarketDataProvider;
use crate::core::records::RecordStore;
use crate::core::storage::FileStorage;
use crate::pipeline::image::ImageOptions;
use crate::pipeline::{
    DispatchResponse, ExtractionAdapter, FanOutCoordinator, FolderNames, JobBackend, JobSnapshot,
    RetryPolicy, TaskContext,
};
use crate::providers::{DriveStorage, GeminiExtractor, TwelveDataProvider, YahooRateProvider};
use crate::store::open_record_store;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";

/// The external services the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn FileStorage>,
    pub extractor: Arc<dyn Extractor>,
    pub market: Arc<dyn MarketDataProvider>,
    pub rates: Arc<dyn ExchangeRateProvider>,
    pub records: Arc<dyn RecordStore>,
}

impl Collaborators {
    /// Builds the HTTP-backed collaborators and the disk store from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let providers = &config.providers;
        let drive = providers
            .drive
            .as_ref()
            .context("Missing providers.drive configuration")?;
        let gemini = providers
            .gemini
            .as_ref()
            .context("Missing providers.gemini configuration")?;
        let twelvedata = providers
            .twelvedata
            .as_ref()
            .context("Missing providers.twelvedata configuration")?;
        let yahoo_url = providers
            .yahoo
            .as_ref()
            .map_or(DEFAULT_YAHOO_URL, |p| &p.base_url);

        Ok(Collaborators {
            storage: Arc::new(DriveStorage::new(
                &drive.base_url,
                drive.access_tokens.clone(),
            )?),
            extractor: Arc::new(GeminiExtractor::new(
                &gemini.base_url,
                &gemini.api_key,
                &gemini.model,
            )?),
            market: Arc::new(TwelveDataProvider::new(
                &twelvedata.base_url,
                &twelvedata.api_key,
            )?),
            rates: Arc::new(YahooRateProvider::new(yahoo_url)?),
            records: open_record_store(config)?,
        })
    }
}

pub struct App {
    coordinator: FanOutCoordinator,
    market: Arc<dyn MarketDataProvider>,
    records: Arc<dyn RecordStore>,
}

impl App {
    pub fn new(collaborators: Collaborators, pipeline: &PipelineConfig) -> Self {
        let ctx = TaskContext {
            storage: collaborators.storage,
            extraction: ExtractionAdapter::new(
                collaborators.extractor,
                ImageOptions {
                    max_width: pipeline.image_max_width,
                    jpeg_quality: pipeline.jpeg_quality,
                },
            ),
            market: Arc::clone(&collaborators.market),
            rates: collaborators.rates,
            records: Arc::clone(&collaborators.records),
            retry: RetryPolicy {
                max_retries: pipeline.max_retries,
                delay: pipeline.retry_delay(),
            },
        };
        let folders = FolderNames {
            tickets: pipeline.tickets_folder.clone(),
            investments: pipeline.investments_folder.clone(),
        };
        debug!(workers = pipeline.workers, ?folders, "Building pipeline");

        App {
            coordinator: FanOutCoordinator::new(ctx, JobBackend::new(), folders, pipeline.workers),
            market: collaborators.market,
            records: collaborators.records,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(Collaborators::from_config(config)?, &config.pipeline))
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub async fn dispatch_ticket_processing(&self, user: UserId) -> DispatchResponse {
        self.coordinator.dispatch_ticket_processing(user).await
    }

    pub async fn dispatch_investment_processing(&self, user: UserId) -> DispatchResponse {
        self.coordinator.dispatch_investment_processing(user).await
    }

    pub async fn job_snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.coordinator.backend().snapshot(job_id).await
    }

    /// Evicts a job once its final snapshot has been read.
    pub async fn forget_job(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.coordinator.backend().forget(job_id).await
    }

    pub async fn compute_monthly_gain_series(
        &self,
        user: UserId,
    ) -> Result<MonthlyGainSeries, PipelineError> {
        self.compute_monthly_gain_series_at(user, Local::now().date_naive())
            .await
    }

    /// Same as [`App::compute_monthly_gain_series`] with an explicit current date.
    pub async fn compute_monthly_gain_series_at(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> Result<MonthlyGainSeries, PipelineError> {
        compute_monthly_gain_series(self.records.as_ref(), self.market.as_ref(), user, today).await
    }
}
