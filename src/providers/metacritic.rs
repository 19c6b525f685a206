//! Metacritic search and game pages.
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::normalization::text::{clean_for_search, parse_score};
use crate::providers::headers::HeaderProfile;
use crate::providers::http::HttpClient;

const SITE_ROOT: &str = "https://www.metacritic.com";
const SEARCH_URL: &str = "https://www.metacritic.com/search";
/// Metacritic's search category id for games.
const GAMES_CATEGORY: &str = "13";

const PAGE_SCORE_SELECTORS: &[&str] = &[
    ".c-productScoreInfo_scoreNumber",
    ".c-siteReviewScore span",
    ".metascore_w.xlarge",
    ".metascore_w.large",
    r#"div[class*="metascore"] span"#,
];

/// First game result of a search. `url` is absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetacriticHit {
    pub score: Option<u32>,
    pub url: Option<String>,
}

#[async_trait]
pub trait MetacriticApi: Send + Sync {
    async fn search(&self, name: &str) -> Result<MetacriticHit>;

    async fn page_score(&self, url: &str) -> Result<Option<u32>>;
}

pub struct MetacriticClient {
    http: Arc<HttpClient>,
}

impl MetacriticClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

pub fn search_url(name: &str) -> String {
    format!(
        "{SEARCH_URL}/{}/",
        urlencoding::encode(&clean_for_search(name))
    )
}

#[async_trait]
impl MetacriticApi for MetacriticClient {
    async fn search(&self, name: &str) -> Result<MetacriticHit> {
        let url = search_url(name);
        let html = self
            .http
            .get_text(
                &url,
                &[("page", "1".into()), ("category", GAMES_CATEGORY.into())],
                HeaderProfile::Browser { referer: None },
            )
            .await?;
        let hit = parse_search_hit(&html);
        debug!(name, ?hit, "metacritic search");
        Ok(hit)
    }

    async fn page_score(&self, url: &str) -> Result<Option<u32>> {
        let html = self
            .http
            .get_text(
                url,
                &[],
                HeaderProfile::Browser {
                    referer: Some("https://www.metacritic.com/"),
                },
            )
            .await?;
        Ok(parse_page_score(&html))
    }
}

pub fn parse_search_hit(html: &str) -> MetacriticHit {
    let doc = Html::parse_document(html);
    let (Ok(link_sel), Ok(score_sel)) = (
        Selector::parse(r#"a[href*="/game/"]"#),
        Selector::parse(".c-siteReviewScore, .metascore_w"),
    ) else {
        return MetacriticHit::default();
    };
    let Some(link) = doc.select(&link_sel).next() else {
        return MetacriticHit::default();
    };
    let url = link.value().attr("href").map(|href| {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{SITE_ROOT}{href}")
        }
    });
    let score = link
        .select(&score_sel)
        .next()
        .and_then(|el| parse_score(&el.text().collect::<String>()));
    MetacriticHit { score, url }
}

/// Metascore from a game page, trying the known layouts newest first.
pub fn parse_page_score(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    PAGE_SCORE_SELECTORS.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        let el = doc.select(&sel).next()?;
        parse_score(&el.text().collect::<String>())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_uses_cleaned_name() {
        assert_eq!(
            search_url("Slay the Spire: Downfall"),
            "https://www.metacritic.com/search/slay%20the%20spire%20downfall/"
        );
    }

    #[test]
    fn search_hit_with_inline_score() {
        let html = r#"<html><body>
            <a href="/game/slay-the-spire/"><span>Slay the Spire</span>
               <div class="c-siteReviewScore"><span>89</span></div></a>
            <a href="/game/other/">Other</a>
        </body></html>"#;
        assert_eq!(
            parse_search_hit(html),
            MetacriticHit {
                score: Some(89),
                url: Some("https://www.metacritic.com/game/slay-the-spire/".into()),
            }
        );
    }

    #[test]
    fn search_hit_without_score_keeps_url() {
        let html = r#"<a href="https://www.metacritic.com/game/inscryption/">Inscryption</a>"#;
        let hit = parse_search_hit(html);
        assert_eq!(hit.score, None);
        assert_eq!(hit.url.as_deref(), Some("https://www.metacritic.com/game/inscryption/"));
    }

    #[test]
    fn search_without_games_is_empty() {
        assert_eq!(parse_search_hit("<p>No results</p>"), MetacriticHit::default());
    }

    #[test]
    fn page_score_falls_through_selectors() {
        let html = r#"<div class="c-siteReviewScore"><span>tbd</span></div>
            <div class="metascore_w large game">84</div>"#;
        assert_eq!(parse_page_score(html), Some(84));
    }

    #[test]
    fn page_score_prefers_product_score() {
        let html = r#"<div class="c-productScoreInfo_scoreNumber"><span>91</span></div>
            <div class="metascore_w xlarge">50</div>"#;
        assert_eq!(parse_page_score(html), Some(91));
    }

    #[test]
    fn page_without_score() {
        assert_eq!(parse_page_score("<html><body>nothing</body></html>"), None);
    }
}
