//! Processing of a single drive file: download, extract, compute, persist.
//!
//! Stages run strictly in sequence. The whole attempt is retried according to
//! the task's [`RetryPolicy`] unless the failure cannot heal by itself.

use super::extract::ExtractionAdapter;
use super::retry::{RetryPolicy, with_retry};
use crate::core::UserId;
use crate::core::currency::ExchangeRateProvider;
use crate::core::date::{NormalizedDate, normalize_date};
use crate::core::error::PipelineError;
use crate::core::extraction::ExtractionIntent;
use crate::core::fact::{DATE_FIELD_KEYS, ExtractedFact, FactMap};
use crate::core::gain::compute_gain;
use crate::core::price::MarketDataProvider;
use crate::core::records::RecordStore;
use crate::core::storage::{FileStorage, RemoteFile};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    Pending,
    Downloading,
    Extracting,
    Computing,
    Persisting,
    Succeeded,
    Failed,
}

impl Display for TaskStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Final result of one task, reported to the job backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Success { file_name: String },
    Unsupported { file_name: String, reason: String },
    Failure { file_name: String, error: String },
}

impl TaskOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            TaskOutcome::Success { file_name }
            | TaskOutcome::Unsupported { file_name, .. }
            | TaskOutcome::Failure { file_name, .. } => file_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

/// One file to process on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub user: UserId,
    pub file: RemoteFile,
    pub intent: ExtractionIntent,
}

/// Collaborators shared by every task of a batch. Tasks never share mutable
/// state through it; each one creates its own record.
#[derive(Clone)]
pub struct TaskContext {
    pub storage: Arc<dyn FileStorage>,
    pub extraction: ExtractionAdapter,
    pub market: Arc<dyn MarketDataProvider>,
    pub rates: Arc<dyn ExchangeRateProvider>,
    pub records: Arc<dyn RecordStore>,
    pub retry: RetryPolicy,
}

/// Runs `item` to completion, retries included.
#[instrument(
    name = "ItemTask",
    skip(ctx, item),
    fields(user = item.user, file = %item.file.name, intent = %item.intent)
)]
pub async fn run_item(ctx: &TaskContext, item: &WorkItem) -> TaskOutcome {
    let result = with_retry(&ctx.retry, |attempt| run_attempt(ctx, item, attempt)).await;
    let file_name = item.file.name.clone();

    match result {
        Ok(()) => {
            info!("File processed successfully");
            TaskOutcome::Success { file_name }
        }
        Err(PipelineError::UnsupportedMimeType(mime)) => {
            info!(%mime, "Skipping unsupported file");
            TaskOutcome::Unsupported {
                file_name,
                reason: format!("Unsupported file type: {mime}"),
            }
        }
        Err(e) => {
            error!(error = %e, "File processing failed");
            TaskOutcome::Failure {
                file_name,
                error: e.class_name().to_string(),
            }
        }
    }
}

/// Tracks the stage of one attempt so failures are logged where they happen.
struct Attempt<'a> {
    ctx: &'a TaskContext,
    item: &'a WorkItem,
    number: usize,
    stage: TaskStage,
    today: NaiveDate,
}

impl Attempt<'_> {
    fn advance(&mut self, next: TaskStage) {
        debug!(attempt = self.number, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }

    async fn run(&mut self) -> Result<(), PipelineError> {
        self.advance(TaskStage::Downloading);
        let payload = self
            .ctx
            .storage
            .get_file_content(self.item.user, &self.item.file.id)
            .await?;

        self.advance(TaskStage::Extracting);
        let facts = self
            .ctx
            .extraction
            .extract(self.item.intent, &self.item.file.mime_type, &payload)
            .await?;

        match self.item.intent {
            ExtractionIntent::PurchaseTicket => self.finish_ticket(facts).await?,
            ExtractionIntent::Investment => self.finish_investment(facts).await?,
        }

        self.advance(TaskStage::Succeeded);
        Ok(())
    }

    async fn finish_ticket(&mut self, mut facts: FactMap) -> Result<(), PipelineError> {
        self.advance(TaskStage::Computing);
        for key in DATE_FIELD_KEYS {
            if let Some(raw) = facts.get(*key) {
                let date = normalize_date(raw.as_str(), self.today);
                facts.insert((*key).to_string(), Value::String(date.to_string()));
            }
        }

        self.advance(TaskStage::Persisting);
        let record = self
            .ctx
            .records
            .create_pending_transaction(self.item.user, &self.item.file.id, facts)
            .await?;
        debug!(record = %record.id, "Pending transaction created");
        Ok(())
    }

    async fn finish_investment(&mut self, facts: FactMap) -> Result<(), PipelineError> {
        self.advance(TaskStage::Computing);
        let fact = ExtractedFact::from_map(&facts)?;
        let purchase_date: NormalizedDate =
            normalize_date(fact.purchase_date.as_deref(), self.today);
        let rate = self
            .ctx
            .rates
            .get_usd_mxn_rate(purchase_date.date())
            .await?;
        let current_price = self.ctx.market.get_current_price(&fact.ticker).await?;
        let gain = compute_gain(&fact, purchase_date, current_price, rate)?;

        self.advance(TaskStage::Persisting);
        let record = self
            .ctx
            .records
            .create_pending_investment(self.item.user, &self.item.file.id, gain)
            .await?;
        debug!(record = %record.id, "Pending investment created");
        Ok(())
    }
}

async fn run_attempt(
    ctx: &TaskContext,
    item: &WorkItem,
    number: usize,
) -> Result<(), PipelineError> {
    let mut attempt = Attempt {
        ctx,
        item,
        number,
        stage: TaskStage::Pending,
        today: Local::now().date_naive(),
    };
    let result = attempt.run().await;
    if let Err(e) = &result {
        debug!(attempt = number, stage = %attempt.stage, error = %e, "Attempt failed");
        attempt.advance(TaskStage::Failed);
    }
    result
}
