//! Document understanding abstractions

use crate::core::error::PipelineError;
use crate::core::fact::FactMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_PDF: &str = "application/pdf";

/// File types eligible for extraction.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = [MIME_JPEG, MIME_PNG, MIME_PDF];

/// What a document is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionIntent {
    PurchaseTicket,
    Investment,
}

impl Display for ExtractionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ExtractionIntent::PurchaseTicket => "purchase ticket",
                ExtractionIntent::Investment => "investment",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            MIME_JPEG | MIME_PNG => Some(DocumentKind::Image),
            MIME_PDF => Some(DocumentKind::Pdf),
            _ => None,
        }
    }
}

/// The four extraction entry points of the document model.
///
/// Image entry points receive JPEG bytes that were already downscaled.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_ticket_from_image(&self, jpeg: &[u8]) -> Result<FactMap, PipelineError>;
    async fn extract_ticket_from_pdf(&self, pdf: &[u8]) -> Result<FactMap, PipelineError>;
    async fn extract_investment_from_image(&self, jpeg: &[u8]) -> Result<FactMap, PipelineError>;
    async fn extract_investment_from_pdf(&self, pdf: &[u8]) -> Result<FactMap, PipelineError>;
}
