use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::portal::{SubsidyRecord, SubsidyStatus};

pub const LOCAL_ID_PREFIX: &str = "local_";

#[derive(Debug, Error, Clone)]
pub enum LocalDataError {
    #[error("failed to list data directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

/// A scraped record loaded from disk, tagged with its lookup id and file of origin.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSubsidy {
    pub local_id: String,
    pub source_file: String,
    pub record: SubsidyRecord,
}

impl LocalSubsidy {
    fn searchable_text(&self) -> String {
        let record = &self.record;
        let mut parts: Vec<&str> = vec![
            record.title.as_str(),
            record.description.as_deref().unwrap_or_default(),
            record.prefecture.as_deref().unwrap_or_default(),
            record.status.map(SubsidyStatus::label).unwrap_or_default(),
            record.max_amount.as_deref().unwrap_or_default(),
        ];
        parts.extend(record.tags.iter().map(String::as_str));
        if let Some(details) = &record.details {
            parts.extend(
                [
                    &details.overview,
                    &details.full_description,
                    &details.target,
                    &details.eligible_expenses,
                ]
                .into_iter()
                .filter_map(|value| value.as_deref()),
            );
        }

        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    fn matches_area(&self, area: &str) -> bool {
        let prefecture = self.record.prefecture.as_deref().unwrap_or_default();
        if !prefecture.is_empty() && (prefecture.contains(area) || area.contains(prefecture)) {
            return true;
        }
        self.record.tags.iter().any(|tag| tag.contains(area))
    }
}

/// In-memory index over every scrape output file in a data directory.
#[derive(Debug, Clone, Default)]
pub struct LocalSubsidySearcher {
    data_dir: PathBuf,
    subsidies: Vec<LocalSubsidy>,
    by_id: HashMap<String, usize>,
}

impl LocalSubsidySearcher {
    /// Loads every `*.json` file in `data_dir`. A missing directory yields an empty
    /// index; unreadable files and malformed records are skipped.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, LocalDataError> {
        let mut searcher = Self {
            data_dir: data_dir.into(),
            ..Self::default()
        };
        searcher.reload()?;
        Ok(searcher)
    }

    pub fn reload(&mut self) -> Result<usize, LocalDataError> {
        self.subsidies.clear();
        self.by_id.clear();

        if !self.data_dir.is_dir() {
            warn!(
                stage = "local_load",
                path = %self.data_dir.display(),
                "data directory not found; local index is empty"
            );
            return Ok(0);
        }

        for path in json_files(&self.data_dir)? {
            let Some(records) = read_records(&path) else {
                continue;
            };
            let source_file = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let loaded = records.len();
            for record in records {
                self.insert(LocalSubsidy {
                    local_id: format!("{LOCAL_ID_PREFIX}{}", record.id),
                    source_file: source_file.clone(),
                    record,
                });
            }
            info!(stage = "local_load", file = %source_file, loaded, "local data file loaded");
        }

        Ok(self.subsidies.len())
    }

    fn insert(&mut self, subsidy: LocalSubsidy) {
        self.by_id
            .insert(subsidy.local_id.clone(), self.subsidies.len());
        self.subsidies.push(subsidy);
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn len(&self) -> usize {
        self.subsidies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subsidies.is_empty()
    }

    pub fn get_by_id(&self, local_id: &str) -> Option<&LocalSubsidy> {
        self.by_id
            .get(local_id)
            .and_then(|index| self.subsidies.get(*index))
    }

    /// Case-insensitive keyword search with optional area and status filters.
    pub fn search(
        &self,
        keyword: &str,
        target_area: Option<&str>,
        acceptance_only: bool,
    ) -> Vec<&LocalSubsidy> {
        let keyword = keyword.to_lowercase();
        let area = target_area.filter(|area| !area.is_empty());

        self.subsidies
            .iter()
            .filter(|subsidy| subsidy.searchable_text().contains(&keyword))
            .filter(|subsidy| area.is_none_or(|area| subsidy.matches_area(area)))
            .filter(|subsidy| {
                !acceptance_only || subsidy.record.status == Some(SubsidyStatus::Open)
            })
            .collect()
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, LocalDataError> {
    let entries = fs::read_dir(dir).map_err(|err| LocalDataError::ReadDir {
        path: dir.to_path_buf(),
        source: Arc::new(err),
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Accepts either the scrape output envelope or a bare array of records.
fn read_records(path: &Path) -> Option<Vec<SubsidyRecord>> {
    let parsed = fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(|err| err.to_string()));
    let value = match parsed {
        Ok(value) => value,
        Err(error) => {
            warn!(stage = "local_load", path = %path.display(), %error, "skipping unreadable data file");
            return None;
        }
    };

    let items = match value {
        Value::Object(mut map) => match map.remove("subsidies") {
            Some(Value::Array(items)) => items,
            _ => {
                debug!(stage = "local_load", path = %path.display(), "no subsidies array; skipping");
                return None;
            }
        },
        Value::Array(items) => items,
        _ => return None,
    };

    let records = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<SubsidyRecord>(item) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(stage = "local_load", path = %path.display(), %error, "skipping malformed record");
                None
            }
        })
        .collect();
    Some(records)
}
