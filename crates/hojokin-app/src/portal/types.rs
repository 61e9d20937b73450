use std::{path::PathBuf, sync::Arc, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

/// Default pause between consecutive portal requests when driven as a library.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1_000);

/// Options for a single portal scrape run.
#[derive(Debug, Clone, Builder)]
pub struct ScrapeOptions {
    #[builder(default = DEFAULT_REQUEST_DELAY)]
    pub delay: Duration,
    #[builder(default = true)]
    pub fetch_details: bool,
    pub max_pages: Option<usize>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Recruitment status shown on a listing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubsidyStatus {
    #[serde(rename = "公募中")]
    Open,
    #[serde(rename = "公募終了")]
    Closed,
}

impl SubsidyStatus {
    pub const OPEN_LABEL: &'static str = "公募中";
    pub const CLOSED_LABEL: &'static str = "公募終了";

    /// Matches a whole card line, tolerating a space inside the label (`公募 中`).
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "公募中" | "公募 中" => Some(Self::Open),
            "公募終了" | "公募 終了" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => Self::OPEN_LABEL,
            Self::Closed => Self::CLOSED_LABEL,
        }
    }
}

/// One subsidy listing recovered from the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsidyRecord {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubsidyStatus>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<SubsidyDetails>,
}

impl SubsidyRecord {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            status: None,
            title: String::new(),
            prefecture: None,
            application_period: None,
            start_date: None,
            end_date: None,
            max_amount: None,
            description: None,
            tags: Vec::new(),
            details: None,
        }
    }

    /// Returns the listing fields combined with detail-page data.
    ///
    /// Empty details leave the record without a `details` entry.
    pub fn with_details(self, details: SubsidyDetails) -> Self {
        if details.is_empty() {
            return self;
        }
        Self {
            details: Some(details),
            ..self
        }
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Labelled values recovered from a subsidy detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsidyDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsidy_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsidy_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible_expenses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_url: Option<String>,
}

impl SubsidyDetails {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Outcome of one scrape run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRun {
    pub records: Vec<SubsidyRecord>,
    pub total_count: usize,
    pub total_pages: usize,
    pub pages_failed: usize,
    pub details_attached: usize,
}

impl ScrapeRun {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Errors raised while talking to the portal or persisting results.
#[derive(Debug, Error, Clone)]
pub enum PortalError {
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("failed to join `{path}` onto base URL: {source}")]
    UrlJoin {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error("request error during `{stage}`: {source}")]
    Request {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("unexpected HTTP status {status} during `{stage}`")]
    HttpStatus { stage: &'static str, status: u16 },
    #[error("failed to read HTTP body during `{stage}`: {source}")]
    Body {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
    #[error("invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl PortalError {
    pub fn request(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Request {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn body(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Body {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(error),
        }
    }

    pub fn json(path: impl Into<PathBuf>, error: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source: Arc::new(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_spaced_labels() {
        assert_eq!(SubsidyStatus::from_line("公募 中"), Some(SubsidyStatus::Open));
        assert_eq!(
            SubsidyStatus::from_line("公募 終了"),
            Some(SubsidyStatus::Closed)
        );
        assert_eq!(SubsidyStatus::from_line("公募中です"), None);
    }

    #[test]
    fn empty_details_are_not_attached() {
        let record = SubsidyRecord::new("1", "https://example.test/subsidies/1");
        let merged = record.clone().with_details(SubsidyDetails::default());
        assert_eq!(merged, record);
    }

    #[test]
    fn details_merge_keeps_listing_fields() {
        let mut record = SubsidyRecord::new("7", "https://example.test/subsidies/7");
        record.title = "福井県：「創業支援」".to_string();
        let details = SubsidyDetails {
            contact: Some("産業政策課".to_string()),
            ..SubsidyDetails::default()
        };
        let merged = record.with_details(details.clone());
        assert_eq!(merged.title, "福井県：「創業支援」");
        assert_eq!(merged.details, Some(details));
    }

    #[test]
    fn options_default_to_library_delay() {
        let opts = ScrapeOptions::default();
        assert_eq!(opts.delay, DEFAULT_REQUEST_DELAY);
        assert!(opts.fetch_details);
        assert_eq!(opts.max_pages, None);
    }
}
