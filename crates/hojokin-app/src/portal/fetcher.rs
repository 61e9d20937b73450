use std::time::Duration;

use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::{debug, warn};

use crate::portal::types::PortalError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "ja,en-US;q=0.7,en;q=0.3";

/// HTTP GET wrapper presenting a browser-like header set to the portal.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    http: Client,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, PortalError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PortalError::request("build_client", err))?;

        Ok(Self { http })
    }

    pub async fn try_fetch(&self, url: &str, stage: &'static str) -> Result<String, PortalError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| PortalError::request(stage, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::HttpStatus {
                stage,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| PortalError::body(stage, err))?;
        debug!(stage, url, bytes = body.len(), "page fetched");
        Ok(body)
    }

    /// Fetches a page, turning any failure into `None` after logging it.
    pub async fn fetch_page(&self, url: &str, stage: &'static str) -> Option<String> {
        match self.try_fetch(url, stage).await {
            Ok(body) => Some(body),
            Err(err) => {
                warn!(stage, url, error = %err, "page fetch failed; skipping");
                None
            }
        }
    }
}
