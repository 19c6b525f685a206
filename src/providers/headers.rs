/// Request header construction with user-agent rotation.
///
/// Storefront and list sites answer bare clients with 403s, so every request
/// carries browser-like headers. The user agent cycles through a fixed list
/// using a cursor owned by [`HeaderRotation`]; tests inject a fixed agent.
///
/// Profiles:
/// - `Browser`: full navigation headers (HTML pages), optional Referer
/// - `Api`: JSON endpoints
/// - `SteamStore`: Steam store pages, with age-gate cookies pre-set
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, COOKIE, PRAGMA,
    REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use tracing::warn;

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    // Firefox
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:123.0) Gecko/20100101 Firefox/123.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
];

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json, text/plain, */*";
const STEAM_AGE_GATE: &str =
    "birthtime=0; mature_content=1; wants_mature_content=1; lastagecheckage=1-0-1990";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile<'a> {
    Browser { referer: Option<&'a str> },
    Api,
    SteamStore,
}

/// Round-robin user-agent source.
#[derive(Debug)]
pub struct HeaderRotation {
    agents: Vec<String>,
    cursor: AtomicUsize,
}

impl HeaderRotation {
    /// Rotate through `agents` starting at the first one. An empty list
    /// falls back to [`DEFAULT_USER_AGENTS`].
    pub fn new(agents: Vec<String>) -> Self {
        let agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            agents
        };
        Self {
            agents,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Default browser agents, starting at a random position so that
    /// consecutive runs don't open with the same fingerprint.
    pub fn browsers() -> Self {
        use rand::Rng;
        let rotation = Self::new(Vec::new());
        let start = rand::thread_rng().gen_range(0..rotation.agents.len());
        rotation.cursor.store(start, Ordering::Relaxed);
        rotation
    }

    /// Always the same agent.
    pub fn fixed(agent: impl Into<String>) -> Self {
        Self::new(vec![agent.into()])
    }

    pub fn next_agent(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[idx]
    }

    /// Headers for one request; advances the rotation by one.
    pub fn headers(&self, profile: HeaderProfile<'_>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(self.next_agent()) {
            Ok(ua) => {
                headers.insert(USER_AGENT, ua);
            }
            Err(e) => warn!(error = %e, "invalid user agent in rotation; sending none"),
        }
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        match profile {
            HeaderProfile::Browser { referer } => {
                headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
                headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
                for (name, value) in [
                    ("sec-fetch-dest", "document"),
                    ("sec-fetch-mode", "navigate"),
                    ("sec-fetch-site", "none"),
                    ("sec-fetch-user", "?1"),
                    ("sec-ch-ua-mobile", "?0"),
                    ("sec-ch-ua-platform", "\"Windows\""),
                ] {
                    headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
                }
                if let Some(referer) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
                    headers.insert(REFERER, referer);
                }
            }
            HeaderProfile::Api => {
                headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));
            }
            HeaderProfile::SteamStore => {
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                );
                headers.insert(COOKIE, HeaderValue::from_static(STEAM_AGE_GATE));
            }
        }
        headers
    }
}
