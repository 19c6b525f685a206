//! Steam storefront product endpoints: app details, review summary, and the
//! user tags embedded in the store page.
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::providers::headers::HeaderProfile;
use crate::providers::http::HttpClient;

const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";
const APP_REVIEWS_URL: &str = "https://store.steampowered.com/appreviews";
const STORE_PAGE_URL: &str = "https://store.steampowered.com/app";

/// Store pages list more tags than are meaningful; keep the top ones.
pub const MAX_STORE_TAGS: usize = 15;

#[derive(Debug, Deserialize)]
struct AppDetailsWrapper {
    success: bool,
    data: Option<AppDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub detailed_description: Option<String>,
    #[serde(default)]
    pub about_the_game: Option<String>,
    #[serde(default)]
    pub header_image: Option<String>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub price_overview: Option<PriceOverview>,
    #[serde(default)]
    pub release_date: Option<ReleaseDate>,
    #[serde(default)]
    pub genres: Vec<Described>,
    #[serde(default)]
    pub categories: Vec<Described>,
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
    #[serde(default)]
    pub metacritic: Option<MetacriticRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceOverview {
    pub final_formatted: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDate {
    #[serde(default)]
    pub coming_soon: bool,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Described {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Screenshot {
    pub path_full: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetacriticRef {
    pub score: Option<u32>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    success: i64,
    query_summary: Option<ReviewSummary>,
}

/// `appreviews` query summary. `review_score` is Steam's 0-10 bucket.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ReviewSummary {
    #[serde(default)]
    pub review_score: u32,
    #[serde(default)]
    pub review_score_desc: Option<String>,
    #[serde(default)]
    pub total_positive: u64,
    #[serde(default)]
    pub total_negative: u64,
    #[serde(default)]
    pub total_reviews: u64,
}

#[async_trait]
pub trait SteamApi: Send + Sync {
    /// `None` when Steam reports the app as unknown or returns no data.
    async fn app_details(&self, app_id: u32) -> Result<Option<AppDetails>>;

    async fn app_reviews(&self, app_id: u32) -> Result<Option<ReviewSummary>>;

    /// User tags from the store page; empty when none could be read.
    async fn store_tags(&self, app_id: u32) -> Result<Vec<String>>;
}

/// Live client for the Steam store.
pub struct SteamStoreClient {
    http: Arc<HttpClient>,
}

impl SteamStoreClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SteamApi for SteamStoreClient {
    async fn app_details(&self, app_id: u32) -> Result<Option<AppDetails>> {
        let mut by_id: HashMap<String, AppDetailsWrapper> = self
            .http
            .get_json(
                APP_DETAILS_URL,
                &[("appids", app_id.to_string()), ("l", "english".into())],
                HeaderProfile::Api,
            )
            .await?;
        Ok(by_id
            .remove(&app_id.to_string())
            .filter(|w| w.success)
            .and_then(|w| w.data))
    }

    async fn app_reviews(&self, app_id: u32) -> Result<Option<ReviewSummary>> {
        let resp: ReviewsResponse = self
            .http
            .get_json(
                &format!("{APP_REVIEWS_URL}/{app_id}"),
                &[
                    ("json", "1".into()),
                    ("language", "all".into()),
                    ("purchase_type", "all".into()),
                ],
                HeaderProfile::Api,
            )
            .await?;
        Ok(if resp.success == 1 {
            resp.query_summary
        } else {
            None
        })
    }

    async fn store_tags(&self, app_id: u32) -> Result<Vec<String>> {
        let html = self
            .http
            .get_text(&format!("{STORE_PAGE_URL}/{app_id}"), &[], HeaderProfile::SteamStore)
            .await?;
        let tags = parse_store_tags(&html);
        debug!(app_id, tags = tags.len(), "steam store tags");
        Ok(tags)
    }
}

fn tag_modal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)InitAppTagModal\([^,]+,\s*(\[[^\]]+\])").expect("static regex")
    })
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Pull tag names out of the `InitAppTagModal(appid, [...])` script call.
pub fn parse_store_tags(html: &str) -> Vec<String> {
    let Some(array) = tag_modal_re().captures(html).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    serde_json::from_str::<Vec<TagEntry>>(array.as_str())
        .map(|tags| {
            tags.into_iter()
                .map(|t| t.name)
                .take(MAX_STORE_TAGS)
                .collect()
        })
        .unwrap_or_default()
}
