//! Steam store search as a discovery source.
//!
//! Each configured tag combination is one query, paged with `start` offsets
//! over the `infinite=1` endpoint, which wraps an HTML fragment in JSON.
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::catalog::{Discovered, DiscoveryPage, DiscoveryQuery, DiscoverySource};
use crate::providers::headers::HeaderProfile;
use crate::providers::http::HttpClient;

const SEARCH_URL: &str = "https://store.steampowered.com/search/results/";
const PAGE_SIZE: usize = 50;

// Tag ids: 9 Strategy, 1666 Card Game, 14139 Turn-Based,
// 4325 Turn-Based Strategy, 17389 Deckbuilding, 1677 Turn-Based Tactics.
pub const DEFAULT_SEARCHES: &[TagSearch] = &[
    TagSearch {
        tags: "1666,9",
        label: "Card Game + Strategy",
        target: 150,
    },
    TagSearch {
        tags: "14139,1666",
        label: "Turn-Based + Card Game",
        target: 150,
    },
    TagSearch {
        tags: "4325,1666",
        label: "Turn-Based Strategy + Card Game",
        target: 100,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSearch {
    pub tags: &'static str,
    pub label: &'static str,
    /// New games wanted from this search.
    pub target: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results_html: String,
    #[serde(default)]
    total_count: usize,
}

pub struct SteamSearchSource {
    http: Arc<HttpClient>,
    searches: Vec<TagSearch>,
    target_cap: Option<usize>,
}

impl SteamSearchSource {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            searches: DEFAULT_SEARCHES.to_vec(),
            target_cap: None,
        }
    }

    /// Cap every search's target of new games.
    pub fn with_target_cap(mut self, cap: Option<usize>) -> Self {
        self.target_cap = cap;
        self
    }

    fn query_for(&self, search: &TagSearch) -> DiscoveryQuery {
        let target = match self.target_cap {
            Some(cap) => search.target.min(cap),
            None => search.target,
        };
        DiscoveryQuery {
            label: search.label.to_string(),
            locator: search.tags.to_string(),
            source_tag: source_tag(search.tags),
            target: Some(target),
        }
    }
}

pub fn source_tag(tags: &str) -> String {
    format!("steam:{tags}")
}

#[async_trait]
impl DiscoverySource for SteamSearchSource {
    fn name(&self) -> &str {
        "steam-search"
    }

    async fn queries(&self) -> Result<Vec<DiscoveryQuery>> {
        Ok(self.searches.iter().map(|s| self.query_for(s)).collect())
    }

    async fn fetch_page(&self, query: &DiscoveryQuery, cursor: usize) -> Result<DiscoveryPage> {
        let resp: SearchResponse = self
            .http
            .get_json(
                SEARCH_URL,
                &search_params(&query.locator, cursor),
                HeaderProfile::Api,
            )
            .await?;
        let results = parse_search_results(&resp.results_html);
        let next = cursor + results.len();
        Ok(DiscoveryPage {
            next: (!results.is_empty() && next < resp.total_count).then_some(next),
            candidates: results
                .into_iter()
                .map(|(id, name)| Discovered::new(id, name, query.source_tag.clone()))
                .collect(),
        })
    }

    /// Search pages are plain offsets, so a failed page can be stepped over.
    fn resume_after_failure(&self, _query: &DiscoveryQuery, cursor: usize) -> Option<usize> {
        Some(cursor + PAGE_SIZE)
    }
}

fn search_params(tags: &str, start: usize) -> Vec<(&'static str, String)> {
    vec![
        ("sort_by", "Reviews_DESC".into()),
        ("tags", tags.to_string()),
        ("supportedlang", "english".into()),
        ("ndl", "1".into()),
        ("count", PAGE_SIZE.to_string()),
        ("start", start.to_string()),
        ("infinite", "1".into()),
    ]
}

fn app_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/app/(\d+)").expect("static regex"))
}

/// `(app id, title)` pairs from a search results fragment.
pub fn parse_search_results(fragment: &str) -> Vec<(u32, String)> {
    let doc = Html::parse_fragment(fragment);
    let (Ok(row_sel), Ok(title_sel)) = (
        Selector::parse("a.search_result_row"),
        Selector::parse(".title"),
    ) else {
        return Vec::new();
    };

    doc.select(&row_sel)
        .filter_map(|row| {
            let href = row.value().attr("href")?;
            let id = app_href_re()
                .captures(href)?
                .get(1)?
                .as_str()
                .parse::<u32>()
                .ok()?;
            let name = row
                .select(&title_sel)
                .next()
                .map(|t| t.text().collect::<String>().trim().to_string())
                .filter(|n| !n.is_empty())?;
            Some((id, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
        <a href="https://store.steampowered.com/app/646570/Slay_the_Spire/?snr=1_7" class="search_result_row ds_collapse_flag">
            <div class="responsive_search_name_combined">
                <div class="col search_name ellipsis"><span class="title">Slay the Spire</span></div>
            </div>
        </a>
        <a href="https://store.steampowered.com/bundle/1234/Some_Bundle/" class="search_result_row">
            <span class="title">Some Bundle</span>
        </a>
        <a href="https://store.steampowered.com/app/1092790/Inscryption/" class="search_result_row">
            <span class="title">  Inscryption </span>
        </a>
        <a href="https://store.steampowered.com/app/999/" class="search_result_row"></a>
    "#;

    #[test]
    fn parses_rows_with_app_links_and_titles() {
        assert_eq!(
            parse_search_results(FRAGMENT),
            vec![
                (646570, "Slay the Spire".to_string()),
                (1092790, "Inscryption".to_string())
            ]
        );
    }

    #[test]
    fn empty_fragment_has_no_results() {
        assert!(parse_search_results("").is_empty());
    }

    #[tokio::test]
    async fn queries_respect_target_cap() {
        let http = Arc::new(
            HttpClient::new(
                std::time::Duration::from_secs(1),
                crate::providers::headers::HeaderRotation::fixed("test"),
            )
            .unwrap(),
        );
        let source = SteamSearchSource::new(http).with_target_cap(Some(120));
        let queries = source.queries().await.unwrap();

        let targets: Vec<_> = queries.iter().map(|q| q.target).collect();
        assert_eq!(targets, vec![Some(120), Some(120), Some(100)]);
        assert_eq!(queries[0].source_tag, "steam:1666,9");
    }

    #[tokio::test]
    async fn failed_page_resumes_one_page_later() {
        let http = Arc::new(
            HttpClient::new(
                std::time::Duration::from_secs(1),
                crate::providers::headers::HeaderRotation::fixed("test"),
            )
            .unwrap(),
        );
        let source = SteamSearchSource::new(http);
        let query = source.queries().await.unwrap().remove(0);
        assert_eq!(source.resume_after_failure(&query, 100), Some(150));
    }

    #[test]
    fn search_params_page_by_offset() {
        let params = search_params("1666,9", 100);
        assert!(params.contains(&("start", "100".to_string())));
        assert!(params.contains(&("count", "50".to_string())));
        assert!(params.contains(&("sort_by", "Reviews_DESC".to_string())));
    }
}
