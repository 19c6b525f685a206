use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::headers::{HeaderProfile, HeaderRotation};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Shared HTTP client. Owns the header rotation so every collaborator
/// advances the same cursor.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    rotation: HeaderRotation,
}

impl HttpClient {
    pub fn new(timeout: Duration, rotation: HeaderRotation) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, rotation })
    }

    /// GET `url` and return the body as text. Non-2xx statuses are errors.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        profile: HeaderProfile<'_>,
    ) -> Result<String> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .query(query)
            .headers(self.rotation.headers(profile))
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 300);
            return Err(anyhow!("HTTP {status} url={url} body={body}"));
        }
        resp.text()
            .await
            .with_context(|| format!("failed to read body: {url}"))
    }

    /// GET `url` and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        profile: HeaderProfile<'_>,
    ) -> Result<T> {
        let body = self.get_text(url, query, profile).await?;
        serde_json::from_str(&body).with_context(|| format!("unexpected JSON shape from {url}"))
    }
}
