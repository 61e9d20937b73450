//! Client for the national JGrants subsidy API.

pub mod client;
pub mod types;

pub use client::{DEFAULT_API_TIMEOUT, JGrantsClient};
pub use types::{
    DEFAULT_API_BASE_URL, JGrantsError, JGrantsSubsidy, MAX_SUBSIDY_ID_CHARS, SearchQuery,
    SortField, SortOrder, SubsidyList, format_subsidy_amount,
};
