//! Persistence of pending records and holdings.

pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::records::RecordStore;
use anyhow::{Context, Result};
use disk::DiskRecordStore;
use std::sync::Arc;

/// Opens the on-disk record store under the configured data path.
pub fn open_record_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    let path = config.data_path()?.join("records");
    let store = DiskRecordStore::open(&path)
        .with_context(|| format!("Failed to open record store at {}", path.display()))?;
    Ok(Arc::new(store))
}
