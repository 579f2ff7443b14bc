use crate::core::UserId;
use crate::core::error::PipelineError;
use crate::core::fact::FactMap;
use crate::core::gain::GainResult;
use crate::core::records::{Holding, PendingInvestment, PendingTransaction, RecordStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct UserRecords {
    transactions: Vec<PendingTransaction>,
    investments: Vec<PendingInvestment>,
    holdings: Vec<Holding>,
}

/// In-memory record store, for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<HashMap<UserId, UserRecords>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a confirmed holding directly, bypassing the pending stage.
    pub async fn insert_holding(&self, user: UserId, holding: Holding) {
        let mut inner = self.inner.lock().await;
        inner.entry(user).or_default().holdings.push(holding);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_pending_transaction(
        &self,
        user: UserId,
        source_file: &str,
        data: FactMap,
    ) -> Result<PendingTransaction, PipelineError> {
        let record = PendingTransaction::new(user, source_file, data);
        let mut inner = self.inner.lock().await;
        inner.entry(user).or_default().transactions.push(record.clone());
        debug!("Stored pending transaction {}", record.id);
        Ok(record)
    }

    async fn create_pending_investment(
        &self,
        user: UserId,
        source_file: &str,
        gain: GainResult,
    ) -> Result<PendingInvestment, PipelineError> {
        let record = PendingInvestment::new(user, source_file, gain);
        let mut inner = self.inner.lock().await;
        inner.entry(user).or_default().investments.push(record.clone());
        debug!("Stored pending investment {}", record.id);
        Ok(record)
    }

    async fn pending_transactions(
        &self,
        user: UserId,
    ) -> Result<Vec<PendingTransaction>, PipelineError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .get(&user)
            .map(|r| r.transactions.clone())
            .unwrap_or_default())
    }

    async fn pending_investments(
        &self,
        user: UserId,
    ) -> Result<Vec<PendingInvestment>, PipelineError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .get(&user)
            .map(|r| r.investments.clone())
            .unwrap_or_default())
    }

    async fn confirm_investment(
        &self,
        user: UserId,
        id: Uuid,
    ) -> Result<Option<Holding>, PipelineError> {
        let mut inner = self.inner.lock().await;
        let Some(records) = inner.get_mut(&user) else {
            return Ok(None);
        };
        let Some(pos) = records.investments.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let pending = records.investments.remove(pos);
        let holding = Holding::from(&pending.gain);
        records.holdings.push(holding.clone());
        Ok(Some(holding))
    }

    async fn holdings(&self, user: UserId) -> Result<Vec<Holding>, PipelineError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .get(&user)
            .map(|r| r.holdings.clone())
            .unwrap_or_default())
    }
}
