//! Routes a downloaded document to the matching extraction entry point.

use super::image::{ImageOptions, optimize_image};
use crate::core::error::PipelineError;
use crate::core::extraction::{DocumentKind, ExtractionIntent, Extractor};
use crate::core::fact::FactMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ExtractionAdapter {
    extractor: Arc<dyn Extractor>,
    image_options: ImageOptions,
}

impl ExtractionAdapter {
    pub fn new(extractor: Arc<dyn Extractor>, image_options: ImageOptions) -> Self {
        Self {
            extractor,
            image_options,
        }
    }

    /// Fails with [`PipelineError::UnsupportedMimeType`] before touching the
    /// payload when `mime_type` is neither JPEG, PNG nor PDF.
    pub async fn extract(
        &self,
        intent: ExtractionIntent,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<FactMap, PipelineError> {
        let kind = DocumentKind::from_mime(mime_type)
            .ok_or_else(|| PipelineError::UnsupportedMimeType(mime_type.to_string()))?;
        debug!(%intent, ?kind, bytes = payload.len(), "Extracting document");

        match (kind, intent) {
            (DocumentKind::Image, intent) => {
                let jpeg = self.optimize(payload).await?;
                match intent {
                    ExtractionIntent::PurchaseTicket => {
                        self.extractor.extract_ticket_from_image(&jpeg).await
                    }
                    ExtractionIntent::Investment => {
                        self.extractor.extract_investment_from_image(&jpeg).await
                    }
                }
            }
            (DocumentKind::Pdf, ExtractionIntent::PurchaseTicket) => {
                self.extractor.extract_ticket_from_pdf(payload).await
            }
            (DocumentKind::Pdf, ExtractionIntent::Investment) => {
                self.extractor.extract_investment_from_pdf(payload).await
            }
        }
    }

    /// Runs the CPU-bound image step on the blocking pool.
    async fn optimize(&self, payload: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let bytes = payload.to_vec();
        let options = self.image_options;
        tokio::task::spawn_blocking(move || optimize_image(&bytes, options))
            .await
            .map_err(|e| PipelineError::Transient(format!("image task failed: {e}")))?
    }
}
