use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enrichment steps in their fixed execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Steam,
    Metacritic,
}

impl StepName {
    pub const ALL: [StepName; 2] = [StepName::Steam, StepName::Metacritic];

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Steam => "steam",
            StepName::Metacritic => "metacritic",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted per-step state. `completed_at` is set once the status leaves
/// `pending`; `error` carries the failure or skip reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub status: StepStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

static PENDING_RESULT: StepResult = StepResult {
    status: StepStatus::Pending,
    completed_at: None,
    error: None,
};

impl StepResult {
    pub fn pending() -> Self {
        PENDING_RESULT.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    fn from_outcome(outcome: StepOutcome, at: DateTime<Utc>) -> Self {
        let (status, error) = match outcome {
            StepOutcome::Success => (StepStatus::Success, None),
            StepOutcome::Failed(reason) => (StepStatus::Failed, Some(reason)),
            StepOutcome::Skipped(reason) => (StepStatus::Skipped, Some(reason)),
        };
        Self {
            status,
            completed_at: Some(at),
            error,
        }
    }
}

impl Default for StepResult {
    fn default() -> Self {
        Self::pending()
    }
}

/// Terminal verdict an enrichment step reports for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Expected absence of data (filtered out, nothing found).
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn status(&self) -> StepStatus {
        match self {
            StepOutcome::Success => StepStatus::Success,
            StepOutcome::Skipped(_) => StepStatus::Skipped,
            StepOutcome::Failed(_) => StepStatus::Failed,
        }
    }
}

/// One catalog entry keyed by its Steam app id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub steam_app_id: u32,
    pub name: String,

    #[serde(default)]
    pub developer: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,

    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub detailed_description: Option<String>,
    #[serde(default)]
    pub about_the_game: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,

    // Steam reviews; score is on a 0-100 scale
    #[serde(default)]
    pub review_score: Option<u32>,
    #[serde(default)]
    pub review_score_desc: Option<String>,
    #[serde(default)]
    pub total_reviews: Option<u64>,
    #[serde(default)]
    pub total_positive: Option<u64>,
    #[serde(default)]
    pub total_negative: Option<u64>,

    #[serde(default)]
    pub metacritic_score: Option<u32>,
    #[serde(default)]
    pub metacritic_url: Option<String>,

    #[serde(default)]
    pub header_image: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,

    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub price_formatted: Option<String>,

    /// Discovery channels that surfaced this game, in first-seen order.
    pub sources: Vec<String>,
    pub extracted_at: DateTime<Utc>,

    #[serde(default)]
    steps: BTreeMap<StepName, StepResult>,
}

impl GameRecord {
    pub fn new(
        steam_app_id: u32,
        name: impl Into<String>,
        source: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            steam_app_id,
            name: name.into(),
            developer: None,
            publisher: None,
            release_date: None,
            release_year: None,
            short_description: None,
            detailed_description: None,
            about_the_game: None,
            tags: Vec::new(),
            genres: Vec::new(),
            categories: Vec::new(),
            review_score: None,
            review_score_desc: None,
            total_reviews: None,
            total_positive: None,
            total_negative: None,
            metacritic_score: None,
            metacritic_url: None,
            header_image: None,
            screenshots: Vec::new(),
            is_free: false,
            price_formatted: None,
            sources: vec![source.into()],
            extracted_at: now,
            steps: StepName::ALL
                .iter()
                .map(|&s| (s, StepResult::pending()))
                .collect(),
        }
    }

    /// Result for `step`; a step missing from an older snapshot reads as pending.
    pub fn step(&self, step: StepName) -> &StepResult {
        self.steps.get(&step).unwrap_or(&PENDING_RESULT)
    }

    pub fn status(&self, step: StepName) -> StepStatus {
        self.step(step).status
    }

    pub fn steps(&self) -> impl Iterator<Item = (StepName, &StepResult)> {
        StepName::ALL.iter().map(move |&s| (s, self.step(s)))
    }

    /// Make sure every registered step has an entry.
    pub(crate) fn fill_missing_steps(&mut self) {
        for step in StepName::ALL {
            self.steps.entry(step).or_default();
        }
    }

    /// Record the terminal outcome of `step`. Returns false (and leaves the
    /// record untouched) when the step already left `pending`.
    pub fn complete_step(&mut self, step: StepName, outcome: StepOutcome, at: DateTime<Utc>) -> bool {
        let slot = self.steps.entry(step).or_default();
        if !slot.is_pending() {
            return false;
        }
        *slot = StepResult::from_outcome(outcome, at);
        true
    }

    /// Put a terminal step back to `pending`. Only the retry policy does this.
    pub(crate) fn reset_step(&mut self, step: StepName) {
        self.steps.insert(step, StepResult::pending());
    }

    /// Append a provenance tag unless it is already recorded.
    pub fn add_source(&mut self, source: &str) -> bool {
        if self.sources.iter().any(|s| s == source) {
            return false;
        }
        self.sources.push(source.to_string());
        true
    }
}
