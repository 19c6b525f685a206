//! Runtime configuration resolved from the environment (and `.env`).
use std::path::PathBuf;
use std::time::Duration;

use crate::util::env::{env_opt, env_parse, log_env_snapshot};

pub const SNAPSHOT_FILE: &str = "games.json";
pub const EXPORT_FILE: &str = "games.csv";

/// Every key read by [`CatalogConfig::from_env`], for the preflight log line.
const CONFIG_KEYS: &[&str] = &[
    "CATALOG_OUTPUT_DIR",
    "CATALOG_CHECKPOINT_EVERY",
    "CATALOG_HTTP_TIMEOUT_SECS",
    "STEAM_STEP_DELAY_MS",
    "STEAM_REVIEWS_DELAY_MS",
    "METACRITIC_STEP_DELAY_MS",
    "METACRITIC_PAGE_DELAY_MS",
    "DISCOVERY_PAGE_DELAY_MS",
    "DISCOVERY_QUERY_DELAY_MS",
    "TBL_LIST_DELAY_MS",
];

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub output_dir: PathBuf,
    /// Checkpoint the store after this many entities within a step.
    pub checkpoint_every: usize,
    pub http_timeout: Duration,
    pub steam_step_delay: Duration,
    pub steam_reviews_delay: Duration,
    pub metacritic_step_delay: Duration,
    pub metacritic_page_delay: Duration,
    pub discovery_page_delay: Duration,
    pub discovery_query_delay: Duration,
    pub tbl_list_delay: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            checkpoint_every: 10,
            http_timeout: Duration::from_secs(15),
            steam_step_delay: Duration::from_millis(1500),
            steam_reviews_delay: Duration::from_millis(300),
            metacritic_step_delay: Duration::from_millis(2000),
            metacritic_page_delay: Duration::from_millis(500),
            discovery_page_delay: Duration::from_millis(1000),
            discovery_query_delay: Duration::from_millis(2000),
            tbl_list_delay: Duration::from_millis(500),
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let ms = |key: &str, fallback: Duration| {
            Duration::from_millis(env_parse(key, fallback.as_millis() as u64))
        };
        let cfg = Self {
            output_dir: env_opt("CATALOG_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.output_dir),
            checkpoint_every: env_parse("CATALOG_CHECKPOINT_EVERY", d.checkpoint_every).max(1),
            http_timeout: Duration::from_secs(env_parse(
                "CATALOG_HTTP_TIMEOUT_SECS",
                d.http_timeout.as_secs(),
            )),
            steam_step_delay: ms("STEAM_STEP_DELAY_MS", d.steam_step_delay),
            steam_reviews_delay: ms("STEAM_REVIEWS_DELAY_MS", d.steam_reviews_delay),
            metacritic_step_delay: ms("METACRITIC_STEP_DELAY_MS", d.metacritic_step_delay),
            metacritic_page_delay: ms("METACRITIC_PAGE_DELAY_MS", d.metacritic_page_delay),
            discovery_page_delay: ms("DISCOVERY_PAGE_DELAY_MS", d.discovery_page_delay),
            discovery_query_delay: ms("DISCOVERY_QUERY_DELAY_MS", d.discovery_query_delay),
            tbl_list_delay: ms("TBL_LIST_DELAY_MS", d.tbl_list_delay),
        };
        log_env_snapshot("catalog", CONFIG_KEYS);
        cfg
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output_dir = dir;
        }
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(SNAPSHOT_FILE)
    }

    pub fn export_path(&self) -> PathBuf {
        self.output_dir.join(EXPORT_FILE)
    }
}
