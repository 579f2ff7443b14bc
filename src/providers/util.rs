use crate::core::error::PipelineError;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

const USER_AGENT: &str = "finflow/0.1";

/// Builds the HTTP client shared by one provider instance.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Joins `path` onto `base_url` and appends url-encoded query parameters.
pub fn endpoint(base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, PipelineError> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    let parsed = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params)
    };
    parsed.map_err(|e| PipelineError::Transient(format!("Invalid URL {raw}: {e}")))
}

/// Server-side failures worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
