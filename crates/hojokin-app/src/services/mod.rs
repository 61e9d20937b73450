//! Search over locally scraped data and the display shapes shared by the CLI and server.

pub mod display;
pub mod local_search;

pub use display::{SubsidyDetailView, SubsidySummary};
pub use local_search::{LOCAL_ID_PREFIX, LocalDataError, LocalSubsidy, LocalSubsidySearcher};
