//! Fans a folder of drive files out into parallel per-item tasks.

use super::job::JobBackend;
use super::task::{TaskContext, TaskOutcome, WorkItem, run_item};
use crate::core::UserId;
use crate::core::extraction::{ExtractionIntent, SUPPORTED_MIME_TYPES};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Synchronous answer of a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchResponse {
    Started { job_id: Uuid, total: usize },
    NoFiles { message: String },
    Error { message: String },
}

/// Drive folders scanned for each extraction intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNames {
    pub tickets: String,
    pub investments: String,
}

impl Default for FolderNames {
    fn default() -> Self {
        FolderNames {
            tickets: "Tickets de Compra".to_string(),
            investments: "Inversiones".to_string(),
        }
    }
}

pub struct FanOutCoordinator {
    ctx: TaskContext,
    backend: JobBackend,
    folders: FolderNames,
    workers: Arc<Semaphore>,
}

impl FanOutCoordinator {
    pub fn new(
        ctx: TaskContext,
        backend: JobBackend,
        folders: FolderNames,
        workers: usize,
    ) -> Self {
        Self {
            ctx,
            backend,
            folders,
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn backend(&self) -> &JobBackend {
        &self.backend
    }

    pub async fn dispatch_ticket_processing(&self, user: UserId) -> DispatchResponse {
        self.dispatch(user, ExtractionIntent::PurchaseTicket).await
    }

    pub async fn dispatch_investment_processing(&self, user: UserId) -> DispatchResponse {
        self.dispatch(user, ExtractionIntent::Investment).await
    }

    /// Lists the intent's folder and starts one task per eligible file.
    ///
    /// Returns as soon as the batch is submitted. Per-item failures are only
    /// visible through the job backend.
    #[instrument(name = "Dispatch", skip(self))]
    async fn dispatch(&self, user: UserId, intent: ExtractionIntent) -> DispatchResponse {
        let folder = match intent {
            ExtractionIntent::PurchaseTicket => &self.folders.tickets,
            ExtractionIntent::Investment => &self.folders.investments,
        };

        let files = match self
            .ctx
            .storage
            .list_files(user, folder, &SUPPORTED_MIME_TYPES)
            .await
        {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, %folder, "Failed to list files");
                return DispatchResponse::Error {
                    message: e.to_string(),
                };
            }
        };

        if files.is_empty() {
            info!(%folder, "No files to process");
            return DispatchResponse::NoFiles {
                message: format!("No new files found in '{folder}'"),
            };
        }

        let handle = self.backend.register(files.len()).await;
        let job_id = handle.job_id;
        let mut group = JoinSet::new();

        for file in files {
            let item = WorkItem { user, file, intent };
            let ctx = self.ctx.clone();
            let backend = self.backend.clone();
            let workers = Arc::clone(&self.workers);
            group.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                let outcome = AssertUnwindSafe(run_item(&ctx, &item))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| TaskOutcome::Failure {
                        file_name: item.file.name.clone(),
                        error: "Panic".to_string(),
                    });
                backend.record(job_id, outcome).await;
            });
        }

        // Joins the group in the background so the caller is not blocked.
        tokio::spawn(async move {
            while let Some(joined) = group.join_next().await {
                if let Err(e) = joined {
                    error!(job = %job_id, error = %e, "Task aborted");
                }
            }
            info!(job = %job_id, "All tasks joined");
        });

        info!(job = %job_id, total = handle.total, %folder, "Dispatched batch");
        DispatchResponse::Started {
            job_id,
            total: handle.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PipelineError;
    use crate::core::fact::FactMap;
    use crate::pipeline::job::JobSnapshot;
    use crate::pipeline::testing::{FakeExtractor, FakeStorage, FixedRates, context, remote};
    use crate::store::memory::MemoryRecordStore;
    use std::time::Duration;

    fn coordinator(storage: Arc<FakeStorage>, extractor: Arc<FakeExtractor>) -> FanOutCoordinator {
        let ctx = context(
            storage,
            extractor,
            Arc::new(FixedRates::new(None)),
            Arc::new(MemoryRecordStore::new()),
        );
        FanOutCoordinator::new(ctx, JobBackend::new(), FolderNames::default(), 2)
    }

    async fn wait_for(backend: &JobBackend, job_id: Uuid) -> JobSnapshot {
        for _ in 0..500 {
            if let Some(snapshot) = backend.snapshot(job_id).await
                && snapshot.is_finished()
            {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }

    #[test_log::test(tokio::test)]
    async fn test_dispatch_runs_one_task_per_file() {
        let storage = Arc::new(FakeStorage::with_files(vec![
            remote("1", "a.pdf", "application/pdf"),
            remote("2", "b.pdf", "application/pdf"),
            remote("3", "c.pdf", "application/pdf"),
        ]));
        let extractor = Arc::new(FakeExtractor::new(Ok(FactMap::new())));
        let coordinator = coordinator(storage.clone(), extractor.clone());

        let response = coordinator.dispatch_ticket_processing(1).await;
        let DispatchResponse::Started { job_id, total } = response else {
            panic!("unexpected response {response:?}");
        };
        assert_eq!(total, 3);

        let snapshot = wait_for(coordinator.backend(), job_id).await;
        assert_eq!(snapshot.completed(), 3);
        assert_eq!(snapshot.succeeded(), 3);
        assert_eq!(storage.downloads(), 3);
        assert_eq!(extractor.calls(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_failures_stay_isolated() {
        let storage = Arc::new(FakeStorage::with_files(vec![
            remote("1", "a.pdf", "application/pdf"),
            remote("2", "b.pdf", "application/pdf"),
        ]));
        let extractor = Arc::new(FakeExtractor::new(Err(PipelineError::MalformedFact(
            "missing ticker".into(),
        ))));
        let coordinator = coordinator(storage, extractor);

        let response = coordinator.dispatch_investment_processing(1).await;
        let DispatchResponse::Started { job_id, .. } = response else {
            panic!("unexpected response {response:?}");
        };

        let snapshot = wait_for(coordinator.backend(), job_id).await;
        assert_eq!(snapshot.completed(), 2);
        assert_eq!(snapshot.succeeded(), 0);
        assert!(snapshot.outcomes.iter().all(|o| matches!(
            o,
            TaskOutcome::Failure { error, .. } if error == "MalformedFact"
        )));
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_folder() {
        let storage = Arc::new(FakeStorage::default());
        let extractor = Arc::new(FakeExtractor::new(Ok(FactMap::new())));
        let coordinator = coordinator(storage.clone(), extractor.clone());

        let response = coordinator.dispatch_ticket_processing(1).await;
        assert_eq!(
            response,
            DispatchResponse::NoFiles {
                message: "No new files found in 'Tickets de Compra'".into()
            }
        );
        assert_eq!(storage.downloads(), 0);
        assert_eq!(extractor.calls(), 0);
        assert_eq!(coordinator.backend().job_count().await, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_listing_error_is_reported() {
        let storage = Arc::new(FakeStorage {
            list_error: Some(PipelineError::Connectivity("invalid credentials".into())),
            ..FakeStorage::default()
        });
        let extractor = Arc::new(FakeExtractor::new(Ok(FactMap::new())));
        let coordinator = coordinator(storage.clone(), extractor.clone());

        let response = coordinator.dispatch_investment_processing(1).await;
        assert!(matches!(
            response,
            DispatchResponse::Error { ref message } if message.contains("invalid credentials")
        ));
        assert_eq!(storage.downloads(), 0);
        assert_eq!(extractor.calls(), 0);
        assert_eq!(coordinator.backend().job_count().await, 0);
    }

    #[test]
    fn test_response_shape() {
        let value = serde_json::to_value(DispatchResponse::NoFiles {
            message: "none".into(),
        })
        .unwrap();
        assert_eq!(value["status"], "NO_FILES");
    }
}
