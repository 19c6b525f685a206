//! Storefront enrichment: details, review summary and user tags from Steam.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::catalog::{GameRecord, StepName, StepOutcome};
use crate::normalization::text::extract_year;
use crate::pipeline::runner::EnrichmentStep;
use crate::providers::steam::api::{AppDetails, ReviewSummary, SteamApi};
use crate::util::pace::pause;

pub const NOT_FOUND: &str = "App not found or API error";
pub const NOT_A_CARD_GAME: &str = "Not a card/deckbuilding game";

pub struct SteamStep<A> {
    api: A,
    throttle: Duration,
    reviews_delay: Duration,
}

impl<A: SteamApi> SteamStep<A> {
    pub fn new(api: A, throttle: Duration, reviews_delay: Duration) -> Self {
        Self {
            api,
            throttle,
            reviews_delay,
        }
    }
}

/// Tags that mark a game as in scope for the catalog.
pub fn is_card_game(tags: &[String]) -> bool {
    tags.iter().any(|tag| {
        let tag = tag.to_lowercase();
        tag.contains("card") || tag.contains("deckbuilding")
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn apply_details(game: &mut GameRecord, data: AppDetails) {
    if let Some(name) = non_empty(data.name) {
        game.name = name;
    }
    game.developer = data.developers.into_iter().next().filter(|d| !d.is_empty());
    game.publisher = data.publishers.into_iter().next().filter(|p| !p.is_empty());
    game.release_date = non_empty(data.release_date.and_then(|r| r.date));
    game.release_year = game.release_date.as_deref().and_then(extract_year);

    game.short_description = non_empty(data.short_description);
    game.detailed_description = non_empty(data.detailed_description);
    game.about_the_game = non_empty(data.about_the_game);

    game.genres = data.genres.into_iter().map(|g| g.description).collect();
    game.categories = data.categories.into_iter().map(|c| c.description).collect();

    game.header_image = non_empty(data.header_image);
    game.screenshots = data
        .screenshots
        .into_iter()
        .filter_map(|s| s.path_full)
        .collect();

    game.is_free = data.is_free;
    game.price_formatted = non_empty(data.price_overview.and_then(|p| p.final_formatted))
        .or_else(|| data.is_free.then(|| "Free".to_string()));

    if let Some(mc) = data.metacritic {
        game.metacritic_score = mc.score;
        game.metacritic_url = mc.url;
    }
}

/// Top of Steam's review-score bucket range.
const MAX_REVIEW_BUCKET: u32 = 10;

fn apply_reviews(game: &mut GameRecord, summary: ReviewSummary) {
    // Steam buckets reviews 0-10; the catalog keeps 0-100.
    game.review_score = if summary.review_score <= MAX_REVIEW_BUCKET {
        Some(summary.review_score * 10)
    } else {
        warn!(
            app_id = game.steam_app_id,
            review_score = summary.review_score,
            "steam: review score out of range; ignored"
        );
        None
    };
    game.review_score_desc = summary.review_score_desc;
    game.total_reviews = Some(summary.total_reviews);
    game.total_positive = Some(summary.total_positive);
    game.total_negative = Some(summary.total_negative);
}

#[async_trait]
impl<A: SteamApi> EnrichmentStep for SteamStep<A> {
    fn name(&self) -> StepName {
        StepName::Steam
    }

    fn throttle(&self) -> Duration {
        self.throttle
    }

    async fn enrich(&self, game: &mut GameRecord) -> Result<StepOutcome> {
        let app_id = game.steam_app_id;
        let Some(details) = self.api.app_details(app_id).await? else {
            return Ok(StepOutcome::Failed(NOT_FOUND.to_string()));
        };
        apply_details(game, details);

        pause(self.reviews_delay).await;
        match self.api.app_reviews(app_id).await {
            Ok(Some(summary)) => apply_reviews(game, summary),
            Ok(None) => debug!(app_id, "steam: no review summary"),
            Err(e) => warn!(app_id, error = %format!("{e:#}"), "steam: reviews unavailable"),
        }

        match self.api.store_tags(app_id).await {
            Ok(tags) if !tags.is_empty() => game.tags = tags,
            Ok(_) => debug!(app_id, "steam: no store tags"),
            Err(e) => warn!(app_id, error = %format!("{e:#}"), "steam: store tags unavailable"),
        }

        if !is_card_game(&game.tags) {
            return Ok(StepOutcome::Skipped(NOT_A_CARD_GAME.to_string()));
        }
        Ok(StepOutcome::Success)
    }
}
