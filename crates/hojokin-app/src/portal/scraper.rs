use std::{collections::HashSet, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::portal::{
    cards::CardExtractor,
    detail::DetailEnricher,
    fetcher::{DEFAULT_TIMEOUT, PageFetcher},
    pagination::PaginationResolver,
    types::{PortalError, ScrapeOptions, ScrapeRun, SubsidyRecord},
};

pub const DEFAULT_BASE_URL: &str = "https://hojyokin-portal.jp/";
/// Fukui prefecture.
pub const DEFAULT_PREF_ID: u32 = 18;

const LIST_PATH: &str = "subsidies/list";
const TITLE_PREVIEW_CHARS: usize = 30;

/// Sequential driver: listing pages, card extraction, dedup, optional enrichment.
#[derive(Debug, Clone)]
pub struct PortalScraper {
    base_url: Url,
    pref_id: u32,
    fetcher: PageFetcher,
    cards: CardExtractor,
    pagination: PaginationResolver,
    detail: DetailEnricher,
}

impl PortalScraper {
    pub fn new(base_url: &str, pref_id: u32) -> Result<Self, PortalError> {
        Self::with_timeout(base_url, pref_id, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        pref_id: u32,
        timeout: Duration,
    ) -> Result<Self, PortalError> {
        let mut parsed = Url::parse(base_url)
            .map_err(|_| PortalError::InvalidBaseUrl(base_url.to_string()))?;
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| PortalError::InvalidBaseUrl(base_url.to_string()))?
            .to_string();

        Ok(Self {
            fetcher: PageFetcher::new(timeout)?,
            cards: CardExtractor::new(&parsed)?,
            pagination: PaginationResolver::new()?,
            detail: DetailEnricher::new(host)?,
            base_url: parsed,
            pref_id,
        })
    }

    pub fn pref_id(&self) -> u32 {
        self.pref_id
    }

    /// Listing URL without query; recorded as the output's `source`.
    pub fn source_url(&self) -> String {
        self.base_url
            .join(LIST_PATH)
            .map(String::from)
            .unwrap_or_else(|_| self.base_url.to_string())
    }

    /// Page 1 omits the `page` parameter.
    pub fn listing_url(&self, page: usize) -> Result<Url, PortalError> {
        debug_assert!(page >= 1);
        let mut url = self
            .base_url
            .join(LIST_PATH)
            .map_err(|source| PortalError::UrlJoin {
                path: LIST_PATH.to_string(),
                source,
            })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pref_id", &self.pref_id.to_string());
            if page > 1 {
                query.append_pair("page", &page.to_string());
            }
        }
        Ok(url)
    }

    pub async fn scrape_all(&self, opts: &ScrapeOptions) -> ScrapeRun {
        let mut seen = HashSet::new();
        let mut run = ScrapeRun::default();

        let first_html = match self.listing_url(1) {
            Ok(url) => self.fetcher.fetch_page(url.as_str(), "listing_page").await,
            Err(err) => {
                warn!(stage = "listing_url", error = %err, "cannot build listing URL");
                None
            }
        };
        let Some(first_html) = first_html else {
            warn!(
                stage = "listing_page",
                pref_id = self.pref_id,
                "first listing page unavailable; nothing scraped"
            );
            return run;
        };

        (run.total_count, run.total_pages) = self.pagination.resolve(&first_html);
        info!(
            stage = "pagination",
            pref_id = self.pref_id,
            total_count = run.total_count,
            total_pages = run.total_pages,
            "listing pagination resolved"
        );
        // A cap of zero means no cap.
        if let Some(max_pages) = opts
            .max_pages
            .filter(|max| *max > 0 && *max < run.total_pages)
        {
            info!(max_pages, "limiting pages scraped");
            run.total_pages = max_pages;
        }

        run.records = self.cards.extract_page(&first_html, &mut seen);
        info!(
            stage = "listing_page",
            page = 1,
            total_pages = run.total_pages,
            found = run.records.len(),
            accumulated = run.records.len(),
            "listing page parsed"
        );

        for page in 2..=run.total_pages {
            pause(opts.delay).await;
            let html = match self.listing_url(page) {
                Ok(url) => self.fetcher.fetch_page(url.as_str(), "listing_page").await,
                Err(err) => {
                    warn!(stage = "listing_url", page, error = %err, "cannot build listing URL");
                    None
                }
            };
            let Some(html) = html else {
                run.pages_failed += 1;
                continue;
            };

            let found = self.cards.extract_page(&html, &mut seen);
            let found_len = found.len();
            run.records.extend(found);
            info!(
                stage = "listing_page",
                page,
                total_pages = run.total_pages,
                found = found_len,
                accumulated = run.records.len(),
                "listing page parsed"
            );
        }

        if opts.fetch_details && !run.records.is_empty() {
            let total = run.records.len();
            let mut enriched = Vec::with_capacity(total);
            for (index, record) in std::mem::take(&mut run.records).into_iter().enumerate() {
                pause(opts.delay).await;
                debug!(
                    stage = "detail_page",
                    position = index + 1,
                    total,
                    title = %preview(&record.title),
                    "fetching detail page"
                );
                let record = self.enrich(record).await;
                if record.details.is_some() {
                    run.details_attached += 1;
                }
                enriched.push(record);
            }
            run.records = enriched;
            info!(
                stage = "detail_page",
                attached = run.details_attached,
                total,
                "detail enrichment finished"
            );
        }

        run
    }

    /// Fetches the record's detail page; a failed fetch returns the record unchanged.
    pub async fn enrich(&self, record: SubsidyRecord) -> SubsidyRecord {
        match self.fetcher.fetch_page(&record.url, "detail_page").await {
            Some(html) => {
                let details = self.detail.extract(&html);
                record.with_details(details)
            }
            None => record,
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

fn preview(title: &str) -> String {
    title.chars().take(TITLE_PREVIEW_CHARS).collect()
}
