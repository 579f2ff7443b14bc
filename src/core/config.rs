use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::UserId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriveProviderConfig {
    pub base_url: String,
    /// OAuth access tokens per user. Obtaining them is outside this tool.
    #[serde(default)]
    pub access_tokens: HashMap<UserId, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiProviderConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TwelveDataProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub drive: Option<DriveProviderConfig>,
    pub gemini: Option<GeminiProviderConfig>,
    pub twelvedata: Option<TwelveDataProviderConfig>,
    pub yahoo: Option<YahooProviderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Retries after the first attempt of a per-item task.
    pub max_retries: usize,
    pub retry_delay_secs: u64,
    /// Maximum number of per-item tasks running at once.
    pub workers: usize,
    pub image_max_width: u32,
    pub jpeg_quality: u8,
    pub tickets_folder: String,
    pub investments_folder: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_retries: 3,
            retry_delay_secs: 60,
            workers: 4,
            image_max_width: 1024,
            jpeg_quality: 80,
            tickets_folder: "Tickets de Compra".to_string(),
            investments_folder: "Inversiones".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub data_path: Option<String>,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "finflow", "finflow")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "finflow", "finflow")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
