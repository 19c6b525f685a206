//! Flat CSV export of the games the Steam step accepted, plus the run summary.
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use tracing::info;

use crate::catalog::{EntityStore, GameRecord, StepName, StepStatus};
use crate::normalization::text::clean_for_export;

pub const EXPORT_HEADER: [&str; 26] = [
    "steam_app_id",
    "name",
    "developer",
    "publisher",
    "release_date",
    "release_year",
    "short_description",
    "about_the_game",
    "tags",
    "genres",
    "categories",
    "review_score",
    "review_score_desc",
    "total_reviews",
    "positive_reviews",
    "negative_reviews",
    "metacritic_score",
    "metacritic_url",
    "header_image",
    "screenshots",
    "is_free",
    "price",
    "sources",
    "extracted_at",
    "step_steam",
    "step_metacritic",
];

const LIST_SEPARATOR: &str = "; ";
const ABOUT_MAX_CHARS: usize = 500;
const EXPORTED_SCREENSHOTS: usize = 3;

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn export_row(game: &GameRecord) -> Vec<String> {
    vec![
        game.steam_app_id.to_string(),
        game.name.clone(),
        opt(game.developer.as_deref()),
        opt(game.publisher.as_deref()),
        opt(game.release_date.as_deref()),
        opt(game.release_year),
        opt(game.short_description.as_deref()),
        clean_for_export(game.about_the_game.as_deref().unwrap_or(""), ABOUT_MAX_CHARS),
        game.tags.join(LIST_SEPARATOR),
        game.genres.join(LIST_SEPARATOR),
        game.categories.join(LIST_SEPARATOR),
        opt(game.review_score),
        opt(game.review_score_desc.as_deref()),
        opt(game.total_reviews),
        opt(game.total_positive),
        opt(game.total_negative),
        opt(game.metacritic_score),
        opt(game.metacritic_url.as_deref()),
        opt(game.header_image.as_deref()),
        game.screenshots
            .iter()
            .take(EXPORTED_SCREENSHOTS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        game.is_free.to_string(),
        opt(game.price_formatted.as_deref()),
        game.sources.join(LIST_SEPARATOR),
        game.extracted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        game.status(StepName::Steam).to_string(),
        game.status(StepName::Metacritic).to_string(),
    ]
}

/// Games eligible for export, most-reviewed first. Ties keep store order.
pub fn export_selection(store: &EntityStore) -> Vec<&GameRecord> {
    let mut rows: Vec<&GameRecord> = store
        .iter()
        .filter(|g| g.status(StepName::Steam) == StepStatus::Success)
        .collect();
    rows.sort_by(|a, b| b.total_reviews.unwrap_or(0).cmp(&a.total_reviews.unwrap_or(0)));
    rows
}

/// Write the export to `out`. Returns the number of data rows.
pub fn write_csv<W: Write>(store: &EntityStore, out: W) -> Result<usize> {
    let rows = export_selection(store);
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(EXPORT_HEADER)?;
    for game in &rows {
        wtr.write_record(export_row(game))
            .with_context(|| format!("write csv row for app {}", game.steam_app_id))?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

pub fn export_csv(store: &EntityStore, path: &Path) -> Result<usize> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = fs::File::create(path).with_context(|| format!("open {}", path.display()))?;
    let written = write_csv(store, file)?;
    info!(rows = written, path = %path.display(), "exported csv");
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    pub total: usize,
    pub steam_ok: usize,
    pub metacritic_scores: usize,
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

impl CatalogSummary {
    pub fn of(store: &EntityStore) -> Self {
        Self {
            total: store.len(),
            steam_ok: store.count_status(StepName::Steam, StepStatus::Success),
            metacritic_scores: store.iter().filter(|g| g.metacritic_score.is_some()).count(),
        }
    }

    pub fn steam_percent(&self) -> u32 {
        percent(self.steam_ok, self.total)
    }

    pub fn metacritic_percent(&self) -> u32 {
        percent(self.metacritic_scores, self.total)
    }

    pub fn log(&self) {
        info!(
            total = self.total,
            steam = self.steam_ok,
            steam_pct = self.steam_percent(),
            metacritic = self.metacritic_scores,
            metacritic_pct = self.metacritic_percent(),
            "catalog summary"
        );
    }
}
