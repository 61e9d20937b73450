//! JSON row and detail shapes consumed by the search page.

use serde::Serialize;
use serde_json::Value;

use crate::jgrants::{JGrantsSubsidy, format_subsidy_amount};
use crate::services::local_search::LocalSubsidy;

pub const JGRANTS_SOURCE_LABEL: &str = "Jグランツ";
pub const PORTAL_SOURCE_LABEL: &str = "補助金ポータル";
pub const MISSING_VALUE: &str = "-";
const NAME_PREVIEW_CHARS: usize = 30;

/// One row of the search result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsidySummary {
    pub id: String,
    pub name: String,
    pub title: String,
    pub target_area: String,
    pub subsidy_max_limit: String,
    pub subsidy_max_limit_raw: Option<i64>,
    pub acceptance_start: String,
    pub acceptance_end: String,
    pub target_employees: String,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl SubsidySummary {
    pub fn from_jgrants(subsidy: &JGrantsSubsidy) -> Self {
        Self {
            id: subsidy.id.clone(),
            name: subsidy.name.clone(),
            title: subsidy.title.clone(),
            target_area: subsidy.target_area_search.clone(),
            subsidy_max_limit: format_subsidy_amount(subsidy.subsidy_max_limit),
            subsidy_max_limit_raw: subsidy.subsidy_max_limit,
            acceptance_start: subsidy.acceptance_start_datetime.clone(),
            acceptance_end: subsidy.acceptance_end_datetime.clone(),
            target_employees: subsidy.target_number_of_employees.clone(),
            source: JGRANTS_SOURCE_LABEL,
            description: None,
            status: None,
            source_url: None,
            tags: None,
        }
    }

    pub fn from_local(subsidy: &LocalSubsidy) -> Self {
        let record = &subsidy.record;
        Self {
            id: subsidy.local_id.clone(),
            name: preview_name(&record.title),
            title: record.title.clone(),
            target_area: record.prefecture.clone().unwrap_or_default(),
            subsidy_max_limit: local_limit(subsidy),
            subsidy_max_limit_raw: None,
            acceptance_start: record.start_date.clone().unwrap_or_default(),
            acceptance_end: record.end_date.clone().unwrap_or_default(),
            target_employees: MISSING_VALUE.to_string(),
            source: PORTAL_SOURCE_LABEL,
            description: Some(record.description.clone().unwrap_or_default()),
            status: Some(local_status(subsidy)),
            source_url: Some(record.url.clone()),
            tags: Some(record.tags.clone()),
        }
    }
}

/// Full view of one subsidy for the detail panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsidyDetailView {
    pub id: String,
    pub name: String,
    pub title: String,
    pub catch_phrase: String,
    pub detail: String,
    pub use_purpose: String,
    pub industry: String,
    pub target_employees: String,
    pub subsidy_rate: String,
    pub subsidy_max_limit: String,
    pub detail_url: String,
    pub workflow: Vec<Value>,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_method: Option<String>,
}

impl SubsidyDetailView {
    pub fn from_jgrants(subsidy: &JGrantsSubsidy) -> Self {
        Self {
            id: subsidy.id.clone(),
            name: subsidy.name.clone(),
            title: subsidy.title.clone(),
            catch_phrase: subsidy.subsidy_catch_phrase.clone(),
            detail: subsidy.detail.clone(),
            use_purpose: subsidy.use_purpose.clone(),
            industry: subsidy.industry.clone(),
            target_employees: subsidy.target_number_of_employees.clone(),
            subsidy_rate: subsidy.subsidy_rate.clone(),
            subsidy_max_limit: format_subsidy_amount(subsidy.subsidy_max_limit),
            detail_url: subsidy.front_subsidy_detail_page_url.clone(),
            workflow: subsidy.workflow.clone(),
            source: JGRANTS_SOURCE_LABEL,
            tags: None,
            status: None,
            application_period: None,
            official_url: None,
            contact: None,
            application_method: None,
        }
    }

    pub fn from_local(subsidy: &LocalSubsidy) -> Self {
        let record = &subsidy.record;
        let details = record.details.clone().unwrap_or_default();
        Self {
            id: subsidy.local_id.clone(),
            name: record.title.clone(),
            title: record.title.clone(),
            catch_phrase: String::new(),
            detail: non_empty(details.full_description.as_deref())
                .or(non_empty(record.description.as_deref()))
                .unwrap_or_default()
                .to_string(),
            use_purpose: details.overview.clone().unwrap_or_default(),
            industry: MISSING_VALUE.to_string(),
            target_employees: or_missing(details.target.as_deref()),
            subsidy_rate: or_missing(details.subsidy_rate.as_deref()),
            subsidy_max_limit: local_limit(subsidy),
            detail_url: record.url.clone(),
            workflow: Vec::new(),
            source: PORTAL_SOURCE_LABEL,
            tags: Some(record.tags.clone()),
            status: Some(local_status(subsidy)),
            application_period: Some(record.application_period.clone().unwrap_or_default()),
            official_url: Some(details.official_url.unwrap_or_default()),
            contact: Some(details.contact.unwrap_or_default()),
            application_method: Some(details.application_method.unwrap_or_default()),
        }
    }
}

fn preview_name(title: &str) -> String {
    if title.chars().count() > NAME_PREVIEW_CHARS {
        let head: String = title.chars().take(NAME_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

fn local_status(subsidy: &LocalSubsidy) -> String {
    subsidy
        .record
        .status
        .map(|status| status.label().to_string())
        .unwrap_or_default()
}

fn local_limit(subsidy: &LocalSubsidy) -> String {
    let record = &subsidy.record;
    let detail_limit = record
        .details
        .as_ref()
        .and_then(|details| details.subsidy_limit.as_deref());
    or_missing(non_empty(record.max_amount.as_deref()).or(non_empty(detail_limit)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn or_missing(value: Option<&str>) -> String {
    non_empty(value).unwrap_or(MISSING_VALUE).to_string()
}
