use crate::core::UserId;
use crate::core::error::PipelineError;
use crate::core::fact::FactMap;
use crate::core::gain::GainResult;
use crate::core::records::{Holding, PendingInvestment, PendingTransaction, RecordStore};
use async_trait::async_trait;
use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const TRANSACTIONS: &str = "pending_transactions";
const INVESTMENTS: &str = "pending_investments";
const HOLDINGS: &str = "holdings";

/// Record store persisted in a fjall keyspace.
///
/// Every partition is keyed by `<user>/<record id>` so a user's records can be
/// read with a single prefix scan.
pub struct DiskRecordStore {
    keyspace: Keyspace,
    transactions: PartitionHandle,
    investments: PartitionHandle,
    holdings: PartitionHandle,
}

fn storage_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Storage(e.to_string())
}

fn user_prefix(user: UserId) -> String {
    format!("{user:020}/")
}

fn record_key(user: UserId, id: Uuid) -> String {
    format!("{}{}", user_prefix(user), id)
}

impl DiskRecordStore {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(path).map_err(storage_err)?;
        let keyspace = Config::new(path).open().map_err(storage_err)?;
        let open = |name: &str| {
            keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(storage_err)
        };
        let transactions = open(TRANSACTIONS)?;
        let investments = open(INVESTMENTS)?;
        let holdings = open(HOLDINGS)?;
        debug!("Opened record store at {}", path.display());

        Ok(Self {
            keyspace,
            transactions,
            investments,
            holdings,
        })
    }

    fn put<V: Serialize>(
        &self,
        partition: &PartitionHandle,
        key: &str,
        value: &V,
    ) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec(value).map_err(storage_err)?;
        let mut batch = self.keyspace.batch();
        batch.insert(partition, key, bytes);
        self.commit(batch)
    }

    /// Applies `batch` atomically and flushes the journal.
    ///
    /// A failed commit leaves nothing behind and stays retryable. Once the
    /// commit went through, a failed flush is reported as
    /// [`PipelineError::Unpersisted`] so the write is not repeated.
    fn commit(&self, batch: Batch) -> Result<(), PipelineError> {
        batch.commit().map_err(storage_err)?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| PipelineError::Unpersisted(e.to_string()))
    }

    fn scan<V: DeserializeOwned>(
        partition: &PartitionHandle,
        user: UserId,
    ) -> Result<Vec<V>, PipelineError> {
        partition
            .prefix(user_prefix(user))
            .map(|entry| {
                let (_, value) = entry.map_err(storage_err)?;
                serde_json::from_slice(&value).map_err(storage_err)
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for DiskRecordStore {
    async fn create_pending_transaction(
        &self,
        user: UserId,
        source_file: &str,
        data: FactMap,
    ) -> Result<PendingTransaction, PipelineError> {
        let record = PendingTransaction::new(user, source_file, data);
        self.put(&self.transactions, &record_key(user, record.id), &record)?;
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
        self.put(&self.investments, &record_key(user, record.id), &record)?;
        debug!("Stored pending investment {}", record.id);
        Ok(record)
    }

    async fn pending_transactions(
        &self,
        user: UserId,
    ) -> Result<Vec<PendingTransaction>, PipelineError> {
        Self::scan(&self.transactions, user)
    }

    async fn pending_investments(
        &self,
        user: UserId,
    ) -> Result<Vec<PendingInvestment>, PipelineError> {
        Self::scan(&self.investments, user)
    }

    async fn confirm_investment(
        &self,
        user: UserId,
        id: Uuid,
    ) -> Result<Option<Holding>, PipelineError> {
        let key = record_key(user, id);
        let Some(bytes) = self.investments.get(&key).map_err(storage_err)? else {
            return Ok(None);
        };
        let pending: PendingInvestment = serde_json::from_slice(&bytes).map_err(storage_err)?;
        let holding = Holding::from(&pending.gain);
        let mut batch = self.keyspace.batch();
        batch.insert(
            &self.holdings,
            key.as_str(),
            serde_json::to_vec(&holding).map_err(storage_err)?,
        );
        batch.remove(&self.investments, key.as_str());
        self.commit(batch)?;
        debug!("Confirmed investment {}", id);
        Ok(Some(holding))
    }

    async fn holdings(&self, user: UserId) -> Result<Vec<Holding>, PipelineError> {
        Self::scan(&self.holdings, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tempfile::tempdir;

    fn gain(ticker: &str) -> GainResult {
        GainResult {
            purchase_date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            ticker: ticker.to_string(),
            asset_name: format!("{ticker} Corp"),
            quantity: Decimal::from(2),
            unit_price: Decimal::new(1050, 1),
            acquisition_cost: Decimal::from(210),
            current_value: Decimal::from(220),
            unrealized_gain: Decimal::from(10),
            exchange_rate: Some(Decimal::new(1712, 2)),
        }
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let data = json!({"total": "12.50", "fecha": "2025-05-02"})
            .as_object()
            .cloned()
            .unwrap();
        let (tx_id, inv_id) = {
            let store = DiskRecordStore::open(dir.path()).unwrap();
            let tx = store
                .create_pending_transaction(1, "file-1", data.clone())
                .await
                .unwrap();
            let inv = store.create_pending_investment(1, "file-2", gain("AAPL")).await.unwrap();
            (tx.id, inv.id)
        };

        let store = DiskRecordStore::open(dir.path()).unwrap();
        let transactions = store.pending_transactions(1).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, tx_id);
        assert_eq!(transactions[0].data, data);

        let investments = store.pending_investments(1).await.unwrap();
        assert_eq!(investments.len(), 1);
        assert_eq!(investments[0].id, inv_id);
        assert_eq!(investments[0].gain, gain("AAPL"));
    }

    #[tokio::test]
    async fn test_prefix_scan_does_not_leak_between_users() {
        let dir = tempdir().unwrap();
        let store = DiskRecordStore::open(dir.path()).unwrap();
        store.create_pending_investment(1, "a", gain("AAA")).await.unwrap();
        store.create_pending_investment(11, "b", gain("BBB")).await.unwrap();

        let first = store.pending_investments(1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].gain.ticker, "AAA");
    }

    #[tokio::test]
    async fn test_confirm_investment() {
        let dir = tempdir().unwrap();
        let store = DiskRecordStore::open(dir.path()).unwrap();
        let pending = store.create_pending_investment(3, "x", gain("MSFT")).await.unwrap();

        assert!(store.confirm_investment(4, pending.id).await.unwrap().is_none());
        let holding = store.confirm_investment(3, pending.id).await.unwrap().unwrap();
        assert_eq!(holding.purchase_price, Decimal::new(1050, 1));

        assert!(store.pending_investments(3).await.unwrap().is_empty());
        assert_eq!(store.holdings(3).await.unwrap(), vec![holding]);
    }

    #[tokio::test]
    async fn test_confirmed_investment_moves_once_across_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = DiskRecordStore::open(dir.path()).unwrap();
            let pending = store.create_pending_investment(5, "y", gain("NVDA")).await.unwrap();
            store.confirm_investment(5, pending.id).await.unwrap().unwrap();
            pending.id
        };

        let store = DiskRecordStore::open(dir.path()).unwrap();
        assert!(store.pending_investments(5).await.unwrap().is_empty());
        assert_eq!(store.holdings(5).await.unwrap().len(), 1);

        // a second confirmation finds nothing to move
        assert!(store.confirm_investment(5, id).await.unwrap().is_none());
        assert_eq!(store.holdings(5).await.unwrap().len(), 1);
    }
}
