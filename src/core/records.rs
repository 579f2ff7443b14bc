//! Persistence abstractions for pending records and confirmed holdings.

use crate::core::UserId;
use crate::core::error::PipelineError;
use crate::core::fact::FactMap;
use crate::core::gain::GainResult;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A receipt awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: Uuid,
    pub owner: UserId,
    pub source_file: String,
    pub data: FactMap,
    pub created_at: DateTime<Utc>,
}

/// An investment purchase awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvestment {
    pub id: Uuid,
    pub owner: UserId,
    pub source_file: String,
    pub gain: GainResult,
    pub created_at: DateTime<Utc>,
}

/// A confirmed position, as consumed by the monthly aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub asset_name: String,
    pub purchase_date: NaiveDate,
    pub quantity: Decimal,
    /// Purchase price per unit, in the same currency as market closes.
    pub purchase_price: Decimal,
}

impl From<&GainResult> for Holding {
    fn from(gain: &GainResult) -> Self {
        Holding {
            ticker: gain.ticker.clone(),
            asset_name: gain.asset_name.clone(),
            purchase_date: gain.purchase_date,
            quantity: gain.quantity,
            purchase_price: gain.unit_price,
        }
    }
}

impl PendingTransaction {
    pub fn new(owner: UserId, source_file: &str, data: FactMap) -> Self {
        PendingTransaction {
            id: Uuid::new_v4(),
            owner,
            source_file: source_file.to_string(),
            data,
            created_at: Utc::now(),
        }
    }
}

impl PendingInvestment {
    pub fn new(owner: UserId, source_file: &str, gain: GainResult) -> Self {
        PendingInvestment {
            id: Uuid::new_v4(),
            owner,
            source_file: source_file.to_string(),
            gain,
            created_at: Utc::now(),
        }
    }
}

/// Record storage. Creating a pending record never touches existing ones.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_pending_transaction(
        &self,
        user: UserId,
        source_file: &str,
        data: FactMap,
    ) -> Result<PendingTransaction, PipelineError>;

    async fn create_pending_investment(
        &self,
        user: UserId,
        source_file: &str,
        gain: GainResult,
    ) -> Result<PendingInvestment, PipelineError>;

    async fn pending_transactions(
        &self,
        user: UserId,
    ) -> Result<Vec<PendingTransaction>, PipelineError>;

    async fn pending_investments(&self, user: UserId)
    -> Result<Vec<PendingInvestment>, PipelineError>;

    /// Turns a pending investment into a holding. Returns `None` if the user
    /// owns no pending investment with that id.
    async fn confirm_investment(
        &self,
        user: UserId,
        id: Uuid,
    ) -> Result<Option<Holding>, PipelineError>;

    async fn holdings(&self, user: UserId) -> Result<Vec<Holding>, PipelineError>;
}
