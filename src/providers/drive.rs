//! Google Drive v3 file storage.

use super::util::{endpoint, http_client};
use crate::core::UserId;
use crate::core::error::PipelineError;
use crate::core::storage::{FileStorage, RemoteFile};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

pub struct DriveStorage {
    base_url: String,
    access_tokens: HashMap<UserId, String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

/// Escapes a value for use inside a single-quoted Drive query literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn folder_query(folder_name: &str) -> String {
    format!(
        "name = {} and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false",
        quote(folder_name)
    )
}

fn children_query(folder_id: &str, mime_types: &[&str]) -> String {
    let mut query = format!("{} in parents and trashed = false", quote(folder_id));
    if !mime_types.is_empty() {
        let alternatives: Vec<String> = mime_types
            .iter()
            .map(|m| format!("mimeType = {}", quote(m)))
            .collect();
        query.push_str(&format!(" and ({})", alternatives.join(" or ")));
    }
    query
}

impl DriveStorage {
    pub fn new(base_url: &str, access_tokens: HashMap<UserId, String>) -> Result<Self> {
        Ok(DriveStorage {
            base_url: base_url.to_string(),
            access_tokens,
            client: http_client(Duration::from_secs(60))?,
        })
    }

    fn token(&self, user: UserId) -> Result<&str, PipelineError> {
        self.access_tokens
            .get(&user)
            .map(String::as_str)
            .ok_or_else(|| {
                PipelineError::Connectivity(format!("No drive credentials for user {user}"))
            })
    }

    async fn get(&self, user: UserId, url: Url) -> Result<Response, PipelineError> {
        debug!("Requesting {}", url.path());
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token(user)?)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    PipelineError::Connectivity(format!("Drive unreachable: {e}"))
                } else {
                    PipelineError::Transient(format!("Drive request failed: {e}"))
                }
            })?;

        match response.status() {
            s if s.is_success() => Ok(response),
            s @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(PipelineError::Connectivity(format!(
                    "Drive rejected the credentials of user {user}: HTTP {s}"
                )))
            }
            s => Err(PipelineError::Transient(format!("Drive returned HTTP {s}"))),
        }
    }

    async fn query(&self, user: UserId, q: &str) -> Result<Vec<RemoteFile>, PipelineError> {
        let url = endpoint(
            &self.base_url,
            "/drive/v3/files",
            &[("q", q), ("fields", "files(id,name,mimeType)")],
        )?;
        let list: FileList = self
            .get(user, url)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Transient(format!("Invalid drive listing: {e}")))?;
        Ok(list.files)
    }
}

#[async_trait]
impl FileStorage for DriveStorage {
    #[instrument(
        name = "DriveList",
        skip(self, mime_types),
        fields(user = user, folder = %folder_name)
    )]
    async fn list_files(
        &self,
        user: UserId,
        folder_name: &str,
        mime_types: &[&str],
    ) -> Result<Vec<RemoteFile>, PipelineError> {
        let folders = self.query(user, &folder_query(folder_name)).await?;
        let Some(folder) = folders.first() else {
            debug!("Folder not found");
            return Ok(Vec::new());
        };

        let files = self
            .query(user, &children_query(&folder.id, mime_types))
            .await?
            .into_iter()
            .filter(|f| mime_types.is_empty() || mime_types.contains(&f.mime_type.as_str()))
            .collect::<Vec<_>>();
        debug!(count = files.len(), "Listed folder");
        Ok(files)
    }

    #[instrument(name = "DriveDownload", skip(self), fields(user = user))]
    async fn get_file_content(
        &self,
        user: UserId,
        file_id: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        let url = endpoint(
            &self.base_url,
            &format!("/drive/v3/files/{file_id}"),
            &[("alt", "media")],
        )?;
        let bytes = self
            .get(user, url)
            .await?
            .bytes()
            .await
            .map_err(|e| PipelineError::Transient(format!("Download interrupted: {e}")))?;
        Ok(bytes.to_vec())
    }
}
