use std::time::Duration;

use reqwest::{
    Client, Url,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use tracing::debug;

use crate::jgrants::types::{JGrantsError, MAX_SUBSIDY_ID_CHARS, SearchQuery, SubsidyList};

pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the public JGrants subsidy API.
#[derive(Debug, Clone)]
pub struct JGrantsClient {
    base_url: Url,
    http: Client,
}

impl JGrantsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, JGrantsError> {
        let parsed = Url::parse(base_url)
            .map_err(|_| JGrantsError::InvalidBaseUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(JGrantsError::InvalidBaseUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| JGrantsError::request("build_client", err))?;

        Ok(Self {
            base_url: parsed,
            http,
        })
    }

    pub async fn search_subsidies(&self, query: &SearchQuery) -> Result<SubsidyList, JGrantsError> {
        debug_assert!(!query.keyword.is_empty());
        let url = self.endpoint(&["subsidies"]);
        self.get_json(url, &query.to_pairs(), "search_subsidies")
            .await
    }

    pub async fn get_subsidy_detail(&self, subsidy_id: &str) -> Result<SubsidyList, JGrantsError> {
        let len = subsidy_id.chars().count();
        if len == 0 || len > MAX_SUBSIDY_ID_CHARS {
            return Err(JGrantsError::InvalidId {
                id: subsidy_id.to_string(),
            });
        }
        let url = self.endpoint(&["subsidies", "id", subsidy_id]);
        self.get_json(url, &[], "subsidy_detail").await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(
        &self,
        url: Url,
        query: &[(&'static str, String)],
        stage: &'static str,
    ) -> Result<SubsidyList, JGrantsError> {
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|err| JGrantsError::request(stage, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(JGrantsError::HttpStatus {
                stage,
                status: status.as_u16(),
            });
        }

        let list: SubsidyList = response
            .json()
            .await
            .map_err(|err| JGrantsError::decode(stage, err))?;
        debug!(stage, url = %url, results = list.result.len(), "JGrants response decoded");
        Ok(list)
    }
}
