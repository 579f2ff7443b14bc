//! In-process result backend for dispatched batches.

use super::task::TaskOutcome;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Dispatched, no child finished yet
    Pending,
    Running,
    /// Every child reported an outcome
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub total: usize,
    pub status: JobStatus,
}

/// A point-in-time view of a job and the outcomes reported so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub handle: JobHandle,
    pub outcomes: Vec<TaskOutcome>,
}

impl JobSnapshot {
    pub fn completed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.status == JobStatus::Completed
    }
}

/// Stores job handles and child outcomes so callers can poll them.
///
/// Only the backend mutates a handle after dispatch.
#[derive(Clone, Default)]
pub struct JobBackend {
    jobs: Arc<Mutex<HashMap<Uuid, JobSnapshot>>>,
}

impl JobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, total: usize) -> JobHandle {
        let handle = JobHandle {
            job_id: Uuid::new_v4(),
            total,
            status: JobStatus::Pending,
        };
        let mut jobs = self.jobs.lock().await;
        jobs.insert(
            handle.job_id,
            JobSnapshot {
                handle: handle.clone(),
                outcomes: Vec::with_capacity(total),
            },
        );
        debug!(job = %handle.job_id, total, "Registered job");
        handle
    }

    pub async fn record(&self, job_id: Uuid, outcome: TaskOutcome) {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(&job_id) else {
            warn!(job = %job_id, "Outcome reported for unknown job");
            return;
        };
        job.outcomes.push(outcome);
        job.handle.status = if job.outcomes.len() >= job.handle.total {
            info!(
                job = %job_id,
                succeeded = job.succeeded(),
                total = job.handle.total,
                "Job completed"
            );
            JobStatus::Completed
        } else {
            JobStatus::Running
        };
    }

    pub async fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.lock().await.get(&job_id).cloned()
    }

    /// Drops a job and returns its last snapshot. Outcomes reported for it
    /// afterwards are ignored.
    pub async fn forget(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let removed = self.jobs.lock().await.remove(&job_id);
        if let Some(job) = &removed {
            debug!(job = %job_id, status = ?job.handle.status, "Forgot job");
        }
        removed
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }
}
