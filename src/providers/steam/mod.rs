//! Steam store: search-based discovery and per-app storefront data.
pub mod api;
pub mod search;

pub use api::{AppDetails, ReviewSummary, SteamApi, SteamStoreClient};
pub use search::{SteamSearchSource, TagSearch, DEFAULT_SEARCHES};
