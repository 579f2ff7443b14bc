//! Error taxonomy shared by the pipeline and its collaborators.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures a collaborator or a pipeline stage can report.
///
/// The variant decides how a per-item task reacts. Only transient, extraction
/// and storage failures are retried. The rest end the task immediately.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedMimeType(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("No USD/MXN exchange rate available for {0}")]
    RateUnavailable(NaiveDate),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Malformed extraction result: {0}")]
    MalformedFact(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The record was written but flushing it to disk failed.
    #[error("Record stored but not flushed: {0}")]
    Unpersisted(String),
}

impl PipelineError {
    /// Short, stable name reported to the job backend instead of the full message.
    pub fn class_name(&self) -> &'static str {
        match self {
            PipelineError::Connectivity(_) => "ConnectivityError",
            PipelineError::Transient(_) => "TransientError",
            PipelineError::UnsupportedMimeType(_) => "UnsupportedMimeType",
            PipelineError::UnsupportedCurrency(_) => "UnsupportedCurrency",
            PipelineError::RateUnavailable(_) => "RateUnavailable",
            PipelineError::InvalidDocument(_) => "InvalidDocument",
            PipelineError::MalformedFact(_) => "MalformedFact",
            PipelineError::Storage(_) => "StorageError",
            PipelineError::Unpersisted(_) => "UnpersistedWrite",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Transient(_)
            | PipelineError::MalformedFact(_)
            | PipelineError::Storage(_) => true,
            PipelineError::Connectivity(_)
            | PipelineError::UnsupportedMimeType(_)
            | PipelineError::UnsupportedCurrency(_)
            | PipelineError::RateUnavailable(_)
            | PipelineError::InvalidDocument(_)
            | PipelineError::Unpersisted(_) => false,
        }
    }
}

/// Network failures of HTTP collaborators are transient by default. File
/// storage maps its own connection and authentication failures explicitly.
impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Transient(e.to_string())
    }
}
