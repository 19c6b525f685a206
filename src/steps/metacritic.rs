//! Review-aggregator enrichment. Runs only for games the Steam step accepted.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::catalog::{GameRecord, StepName, StepOutcome, StepStatus};
use crate::pipeline::runner::EnrichmentStep;
use crate::providers::metacritic::{MetacriticApi, MetacriticHit};
use crate::util::pace::pause;

pub const HAVE_STEAM_SCORE: &str = "Already have score from Steam";
pub const NO_SCORE_ON_PAGE: &str = "Found page but no score";
pub const NOT_FOUND: &str = "Not found on Metacritic";

pub struct MetacriticStep<M> {
    api: M,
    throttle: Duration,
    page_delay: Duration,
}

impl<M: MetacriticApi> MetacriticStep<M> {
    pub fn new(api: M, throttle: Duration, page_delay: Duration) -> Self {
        Self {
            api,
            throttle,
            page_delay,
        }
    }

    /// Page lookups are best effort: a failed fetch counts as "no score".
    async fn page_score(&self, url: &str) -> Option<u32> {
        match self.api.page_score(url).await {
            Ok(score) => score,
            Err(e) => {
                warn!(url, error = %format!("{e:#}"), "metacritic: page fetch failed");
                None
            }
        }
    }

    async fn search(&self, name: &str) -> MetacriticHit {
        match self.api.search(name).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(name, error = %format!("{e:#}"), "metacritic: search failed");
                MetacriticHit::default()
            }
        }
    }
}

#[async_trait]
impl<M: MetacriticApi> EnrichmentStep for MetacriticStep<M> {
    fn name(&self) -> StepName {
        StepName::Metacritic
    }

    fn throttle(&self) -> Duration {
        self.throttle
    }

    fn is_eligible(&self, game: &GameRecord) -> bool {
        game.status(StepName::Steam) == StepStatus::Success
            && game.step(StepName::Metacritic).is_pending()
    }

    async fn enrich(&self, game: &mut GameRecord) -> Result<StepOutcome> {
        if game.metacritic_score.is_some() && game.metacritic_url.is_some() {
            return Ok(StepOutcome::Skipped(HAVE_STEAM_SCORE.to_string()));
        }

        if game.metacritic_score.is_none() {
            if let Some(url) = game.metacritic_url.clone() {
                if let Some(score) = self.page_score(&url).await {
                    game.metacritic_score = Some(score);
                    return Ok(StepOutcome::Success);
                }
            }
        }

        let hit = self.search(&game.name).await;
        debug!(app_id = game.steam_app_id, ?hit, "metacritic: search result");
        let Some(url) = hit.url else {
            return Ok(StepOutcome::Skipped(NOT_FOUND.to_string()));
        };
        if let Some(score) = hit.score {
            game.metacritic_score = Some(score);
            game.metacritic_url = Some(url);
            return Ok(StepOutcome::Success);
        }

        pause(self.page_delay).await;
        let score = self.page_score(&url).await;
        game.metacritic_url = Some(url);
        match score {
            Some(score) => {
                game.metacritic_score = Some(score);
                Ok(StepOutcome::Success)
            }
            None => Ok(StepOutcome::Skipped(NO_SCORE_ON_PAGE.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMetacritic {
        hit: MetacriticHit,
        search_fails: bool,
        pages: HashMap<String, u32>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetacriticApi for FakeMetacritic {
        async fn search(&self, name: &str) -> Result<MetacriticHit> {
            self.calls.lock().unwrap().push(format!("search:{name}"));
            if self.search_fails {
                return Err(anyhow!("HTTP 403"));
            }
            Ok(self.hit.clone())
        }

        async fn page_score(&self, url: &str) -> Result<Option<u32>> {
            self.calls.lock().unwrap().push(format!("page:{url}"));
            Ok(self.pages.get(url).copied())
        }
    }

    fn step(api: FakeMetacritic) -> MetacriticStep<FakeMetacritic> {
        MetacriticStep::new(api, Duration::ZERO, Duration::ZERO)
    }

    fn game() -> GameRecord {
        GameRecord::new(1, "Inscryption", "turnbasedlovers", Utc::now())
    }

    const URL: &str = "https://www.metacritic.com/game/inscryption/";

    #[tokio::test]
    async fn steam_score_short_circuits() {
        let s = step(FakeMetacritic::default());
        let mut g = game();
        g.metacritic_score = Some(85);
        g.metacritic_url = Some(URL.into());
        let outcome = s.enrich(&mut g).await.unwrap();
        assert_eq!(outcome, StepOutcome::Skipped(HAVE_STEAM_SCORE.into()));
        assert!(s.api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn known_url_is_read_before_searching() {
        let s = step(FakeMetacritic {
            pages: HashMap::from([(URL.to_string(), 85)]),
            ..FakeMetacritic::default()
        });
        let mut g = game();
        g.metacritic_url = Some(URL.into());
        assert_eq!(s.enrich(&mut g).await.unwrap(), StepOutcome::Success);
        assert_eq!(g.metacritic_score, Some(85));
        assert_eq!(*s.api.calls.lock().unwrap(), vec![format!("page:{URL}")]);
    }

    #[tokio::test]
    async fn search_hit_with_score() {
        let s = step(FakeMetacritic {
            hit: MetacriticHit {
                score: Some(85),
                url: Some(URL.into()),
            },
            ..FakeMetacritic::default()
        });
        let mut g = game();
        assert_eq!(s.enrich(&mut g).await.unwrap(), StepOutcome::Success);
        assert_eq!(g.metacritic_score, Some(85));
        assert_eq!(g.metacritic_url.as_deref(), Some(URL));
    }

    #[tokio::test]
    async fn search_hit_then_page_score() {
        let s = step(FakeMetacritic {
            hit: MetacriticHit {
                score: None,
                url: Some(URL.into()),
            },
            pages: HashMap::from([(URL.to_string(), 85)]),
            ..FakeMetacritic::default()
        });
        let mut g = game();
        assert_eq!(s.enrich(&mut g).await.unwrap(), StepOutcome::Success);
        assert_eq!(g.metacritic_score, Some(85));
    }

    #[tokio::test]
    async fn page_without_score_keeps_url() {
        let s = step(FakeMetacritic {
            hit: MetacriticHit {
                score: None,
                url: Some(URL.into()),
            },
            ..FakeMetacritic::default()
        });
        let mut g = game();
        assert_eq!(
            s.enrich(&mut g).await.unwrap(),
            StepOutcome::Skipped(NO_SCORE_ON_PAGE.into())
        );
        assert_eq!(g.metacritic_url.as_deref(), Some(URL));
        assert_eq!(g.metacritic_score, None);
    }

    #[tokio::test]
    async fn nothing_found_or_search_error_skips() {
        let mut g = game();
        let outcome = step(FakeMetacritic::default()).enrich(&mut g).await.unwrap();
        assert_eq!(outcome, StepOutcome::Skipped(NOT_FOUND.into()));

        let failing = step(FakeMetacritic {
            search_fails: true,
            ..FakeMetacritic::default()
        });
        let outcome = failing.enrich(&mut g).await.unwrap();
        assert_eq!(outcome, StepOutcome::Skipped(NOT_FOUND.into()));
    }

    #[test]
    fn eligibility_requires_steam_success() {
        let s = step(FakeMetacritic::default());
        let mut g = game();
        assert!(!s.is_eligible(&g));
        g.complete_step(StepName::Steam, StepOutcome::Success, Utc::now());
        assert!(s.is_eligible(&g));
        g.complete_step(StepName::Metacritic, StepOutcome::Skipped("x".into()), Utc::now());
        assert!(!s.is_eligible(&g));
    }
}
