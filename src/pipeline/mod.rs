//! Asynchronous extraction pipeline: per-item tasks and their fan-out.

pub mod dispatch;
pub mod extract;
pub mod image;
pub mod job;
pub mod retry;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{DispatchResponse, FanOutCoordinator, FolderNames};
pub use extract::ExtractionAdapter;
pub use job::{JobBackend, JobHandle, JobSnapshot, JobStatus};
pub use retry::RetryPolicy;
pub use task::{TaskContext, TaskOutcome, TaskStage, WorkItem, run_item};
