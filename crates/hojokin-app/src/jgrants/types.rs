use std::{fmt, str::FromStr, sync::Arc};

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.jgrants-portal.go.jp/exp/v1/public";
pub const MAX_SUBSIDY_ID_CHARS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedDate,
    AcceptanceStartDatetime,
    AcceptanceEndDatetime,
}

impl SortField {
    pub const ALL: [SortField; 3] = [
        SortField::CreatedDate,
        SortField::AcceptanceStartDatetime,
        SortField::AcceptanceEndDatetime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedDate => "created_date",
            Self::AcceptanceStartDatetime => "acceptance_start_datetime",
            Self::AcceptanceEndDatetime => "acceptance_end_datetime",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CreatedDate => "登録日",
            Self::AcceptanceStartDatetime => "受付開始日",
            Self::AcceptanceEndDatetime => "受付終了日",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| format!("unknown sort field `{value}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 2] = [SortOrder::Asc, SortOrder::Desc];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Asc => "昇順",
            Self::Desc => "降順",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(format!("unknown sort order `{other}`")),
        }
    }
}

/// Subsidy list query accepted by the public API.
#[derive(Debug, Clone, Builder)]
pub struct SearchQuery {
    #[builder(into)]
    pub keyword: String,
    #[builder(default)]
    pub sort: SortField,
    #[builder(default)]
    pub order: SortOrder,
    #[builder(default = false)]
    pub acceptance_only: bool,
    #[builder(into)]
    pub target_area: Option<String>,
    #[builder(into)]
    pub target_number_of_employees: Option<String>,
    #[builder(into)]
    pub use_purpose: Option<String>,
}

impl SearchQuery {
    /// Query string pairs in the order the API documents them.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("keyword", self.keyword.clone()),
            ("sort", self.sort.as_str().to_string()),
            ("order", self.order.as_str().to_string()),
            ("acceptance", if self.acceptance_only { "1" } else { "0" }.to_string()),
        ];
        let optional = [
            ("target_area_search", &self.target_area),
            ("target_number_of_employees", &self.target_number_of_employees),
            ("use_purpose", &self.use_purpose),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key, value.to_string()));
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResultSet {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListMetadata {
    #[serde(default)]
    pub resultset: ResultSet,
}

/// Response envelope shared by the list and detail endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubsidyList {
    #[serde(default)]
    pub metadata: ListMetadata,
    #[serde(default)]
    pub result: Vec<JGrantsSubsidy>,
}

impl SubsidyList {
    pub fn count(&self) -> u64 {
        self.metadata.resultset.count
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct JGrantsSubsidy {
    pub id: String,
    pub name: String,
    pub title: String,
    pub target_area_search: String,
    pub subsidy_max_limit: Option<i64>,
    pub acceptance_start_datetime: String,
    pub acceptance_end_datetime: String,
    pub target_number_of_employees: String,
    pub subsidy_catch_phrase: String,
    pub detail: String,
    pub use_purpose: String,
    pub industry: String,
    pub subsidy_rate: String,
    pub front_subsidy_detail_page_url: String,
    pub workflow: Vec<Value>,
}

#[derive(Debug, Error, Clone)]
pub enum JGrantsError {
    #[error("補助金IDは1〜{max}文字で指定してください", max = MAX_SUBSIDY_ID_CHARS)]
    InvalidId { id: String },
    #[error("invalid API base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("API通信エラー: {source} (stage `{stage}`)")]
    Request {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("API通信エラー: HTTP {status} (stage `{stage}`)")]
    HttpStatus { stage: &'static str, status: u16 },
    #[error("API通信エラー: invalid response body ({source}, stage `{stage}`)")]
    Decode {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
}

impl JGrantsError {
    pub fn request(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Request {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn decode(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Decode {
            stage,
            source: Arc::new(error),
        }
    }
}

/// Human-readable yen amount: `上限なし`, `1.5億円`, `500万円` or `9,800円`.
pub fn format_subsidy_amount(amount: Option<i64>) -> String {
    const OKU: i64 = 100_000_000;
    const MAN: i64 = 10_000;

    match amount {
        None => "上限なし".to_string(),
        Some(value) if value >= OKU => format!("{:.1}億円", value as f64 / OKU as f64),
        Some(value) if value >= MAN => format!("{:.0}万円", value as f64 / MAN as f64),
        Some(value) => format!("{}円", group_thousands(value)),
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_scaled_to_japanese_units() {
        assert_eq!(format_subsidy_amount(None), "上限なし");
        assert_eq!(format_subsidy_amount(Some(150_000_000)), "1.5億円");
        assert_eq!(format_subsidy_amount(Some(100_000_000)), "1.0億円");
        assert_eq!(format_subsidy_amount(Some(5_000_000)), "500万円");
        assert_eq!(format_subsidy_amount(Some(10_000)), "1万円");
        assert_eq!(format_subsidy_amount(Some(9_800)), "9,800円");
        assert_eq!(format_subsidy_amount(Some(0)), "0円");
    }

    #[test]
    fn optional_filters_are_only_sent_when_present() {
        let query = SearchQuery::builder()
            .keyword("DX")
            .acceptance_only(true)
            .target_area("福井県")
            .use_purpose(String::new())
            .build();
        let pairs = query.to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("keyword", "DX".to_string()),
                ("sort", "created_date".to_string()),
                ("order", "DESC".to_string()),
                ("acceptance", "1".to_string()),
                ("target_area_search", "福井県".to_string()),
            ]
        );
    }

    #[test]
    fn sort_values_parse_from_form_strings() {
        assert_eq!(
            "acceptance_end_datetime".parse::<SortField>(),
            Ok(SortField::AcceptanceEndDatetime)
        );
        assert!("name".parse::<SortField>().is_err());
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert!("asc".parse::<SortOrder>().is_err());
    }

    #[test]
    fn tolerant_decoding_fills_missing_fields() {
        let raw = r#"{"result":[{"id":"a0W5h00000UiBbHEAV","name":"S-00001","subsidy_max_limit":3000000}]}"#;
        let list: SubsidyList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.count(), 0);
        assert_eq!(list.result[0].subsidy_max_limit, Some(3_000_000));
        assert_eq!(list.result[0].title, "");
        assert!(list.result[0].workflow.is_empty());
    }
}
