//! Cloud file storage abstractions

use crate::core::UserId;
use crate::core::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Access to a user's cloud drive.
///
/// Implementations must report authentication and connection failures as
/// [`PipelineError::Connectivity`] so callers can tell them apart from
/// transient errors.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn list_files(
        &self,
        user: UserId,
        folder_name: &str,
        mime_types: &[&str],
    ) -> Result<Vec<RemoteFile>, PipelineError>;

    async fn get_file_content(&self, user: UserId, file_id: &str)
    -> Result<Vec<u8>, PipelineError>;
}
