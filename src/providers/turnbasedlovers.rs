//! turnbasedlovers.com curated lists as a discovery source.
//!
//! The lists index links to individual list pages; each list page is one
//! single-page query. Games are recognised by their Steam store links or by
//! `data-steam-id` / `data-appid` attributes.
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::catalog::{Discovered, DiscoveryPage, DiscoveryQuery, DiscoverySource};
use crate::normalization::text::truncate_chars;
use crate::providers::headers::HeaderProfile;
use crate::providers::http::HttpClient;

pub const SITE_ROOT: &str = "https://turnbasedlovers.com";
pub const LISTS_URL: &str = "https://turnbasedlovers.com/-/lists/";
pub const SOURCE_TAG: &str = "turnbasedlovers";

const MAX_ATTR_NAME_CHARS: usize = 100;

pub struct TurnBasedLoversSource {
    http: Arc<HttpClient>,
}

impl TurnBasedLoversSource {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DiscoverySource for TurnBasedLoversSource {
    fn name(&self) -> &str {
        SOURCE_TAG
    }

    async fn queries(&self) -> Result<Vec<DiscoveryQuery>> {
        let html = self
            .http
            .get_text(LISTS_URL, &[], HeaderProfile::Browser { referer: None })
            .await?;
        let links = parse_list_links(&html);
        info!(lists = links.len(), "turnbasedlovers: list pages found");
        Ok(links
            .into_iter()
            .map(|url| DiscoveryQuery {
                label: list_label(&url),
                locator: url,
                source_tag: SOURCE_TAG.to_string(),
                target: None,
            })
            .collect())
    }

    async fn fetch_page(&self, query: &DiscoveryQuery, _cursor: usize) -> Result<DiscoveryPage> {
        let html = self
            .http
            .get_text(
                &query.locator,
                &[],
                HeaderProfile::Browser {
                    referer: Some(LISTS_URL),
                },
            )
            .await?;
        Ok(DiscoveryPage {
            candidates: parse_list_games(&html)
                .into_iter()
                .map(|(id, name)| Discovered::new(id, name, query.source_tag.clone()))
                .collect(),
            next: None,
        })
    }
}

fn list_label(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Absolute URLs of the individual list pages linked from the index, in page order.
pub fn parse_list_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(sel) = selector(r#"a[href*="/lists/"]"#) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.ends_with("/lists/"))
        .map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{SITE_ROOT}{href}")
            }
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn steam_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"store\.steampowered\.com/app/(\d+)").expect("static regex"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Heading text of the closest container around a Steam link.
fn nearby_name(link: ElementRef<'_>, container: &Selector, heading: &Selector) -> Option<String> {
    let parent = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| container.matches(el))?;
    parent
        .select(heading)
        .next()
        .map(element_text)
        .filter(|n| !n.is_empty())
}

/// `(app id, name)` pairs found on one list page, deduplicated by id.
pub fn parse_list_games(html: &str) -> Vec<(u32, String)> {
    let doc = Html::parse_document(html);
    let (Some(link_sel), Some(container_sel), Some(heading_sel), Some(attr_sel), Some(attr_name_sel)) = (
        selector(r#"a[href*="store.steampowered.com/app/"]"#),
        selector("article, .game-item, .entry, div"),
        selector("h2, h3, h4, .title, .name"),
        selector("[data-steam-id], [data-appid]"),
        selector(".title, .name, h2, h3"),
    ) else {
        return Vec::new();
    };

    let mut games: Vec<(u32, String)> = Vec::new();
    let mut seen = HashSet::new();

    for link in doc.select(&link_sel) {
        let Some(id) = link
            .value()
            .attr("href")
            .and_then(|href| steam_link_re().captures(href))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        let name = nearby_name(link, &container_sel, &heading_sel)
            .or_else(|| Some(element_text(link)).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| format!("Steam App {id}"));
        if seen.insert(id) {
            games.push((id, name));
        }
    }

    for el in doc.select(&attr_sel) {
        let attrs = el.value();
        let id = attrs
            .attr("data-steam-id")
            .or_else(|| attrs.attr("data-appid"))
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|id| *id > 0);
        let Some(id) = id else { continue };
        let name = el
            .select(&attr_name_sel)
            .next()
            .map(element_text)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| element_text(el));
        if name.is_empty() || seen.contains(&id) {
            continue;
        }
        seen.insert(id);
        games.push((id, truncate_chars(&name, MAX_ATTR_NAME_CHARS).to_string()));
    }

    games
}
