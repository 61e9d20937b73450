use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::portal::types::{PortalError, SubsidyRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub source: String,
    pub prefecture_id: u32,
    pub scraped_at: DateTime<Utc>,
    pub total_count: usize,
}

/// Envelope written by the `scrape` command and read back by the local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutput {
    pub metadata: ScrapeMetadata,
    pub subsidies: Vec<SubsidyRecord>,
}

impl ScrapeOutput {
    pub fn new(source: impl Into<String>, prefecture_id: u32, subsidies: Vec<SubsidyRecord>) -> Self {
        Self {
            metadata: ScrapeMetadata {
                source: source.into(),
                prefecture_id,
                scraped_at: Utc::now(),
                total_count: subsidies.len(),
            },
            subsidies,
        }
    }

    /// Writes pretty JSON to `path`, creating parent directories and replacing any
    /// existing file.
    pub fn save(&self, path: &Path) -> Result<(), PortalError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| PortalError::io(parent, err))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| PortalError::json(path, err))?;
        fs::write(path, json).map_err(|err| PortalError::io(path, err))?;
        info!(
            stage = "output",
            path = %path.display(),
            total_count = self.metadata.total_count,
            "scrape output saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PortalError> {
        let raw = fs::read_to_string(path).map_err(|err| PortalError::io(path, err))?;
        serde_json::from_str(&raw).map_err(|err| PortalError::json(path, err))
    }
}

pub fn default_output_file(data_dir: &Path, prefecture_id: u32) -> PathBuf {
    data_dir.join(format!("subsidies_pref_{prefecture_id}.json"))
}
