//! Scraper for the regional subsidy portal's listing and detail pages.

pub mod cards;
pub mod detail;
pub mod fetcher;
mod html;
pub mod output;
pub mod pagination;
pub mod scraper;
pub mod types;

pub use cards::{CardExtractor, PREFECTURES};
pub use detail::DetailEnricher;
pub use fetcher::PageFetcher;
pub use output::{ScrapeMetadata, ScrapeOutput, default_output_file};
pub use pagination::PaginationResolver;
pub use self::scraper::{DEFAULT_BASE_URL, DEFAULT_PREF_ID, PortalScraper};
pub use types::{
    DEFAULT_REQUEST_DELAY, PortalError, ScrapeOptions, ScrapeRun, SubsidyDetails, SubsidyRecord,
    SubsidyStatus,
};
