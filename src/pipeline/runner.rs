//! Generic executor for one enrichment step over the whole store.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::catalog::{EntityStore, GameRecord, SnapshotError, SnapshotFile, StepName, StepOutcome, StepStatus};
use crate::util::pace::pause;

/// A named enrichment operation.
///
/// `enrich` may update any descriptive field of the record and reports the
/// step's verdict; the runner is the only place that writes the step result.
/// An `Err` is recorded as a failure carrying the error message.
#[async_trait]
pub trait EnrichmentStep: Send + Sync {
    fn name(&self) -> StepName;

    /// Pause inserted between two games.
    fn throttle(&self) -> Duration {
        Duration::ZERO
    }

    fn is_eligible(&self, game: &GameRecord) -> bool {
        game.step(self.name()).is_pending()
    }

    async fn enrich(&self, game: &mut GameRecord) -> Result<StepOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub step: StepName,
    pub eligible: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StepReport {
    fn new(step: StepName) -> Self {
        Self {
            step,
            eligible: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        }
    }

    /// Failed plus skipped.
    pub fn other(&self) -> usize {
        self.failed + self.skipped
    }

    fn record(&mut self, status: StepStatus) {
        match status {
            StepStatus::Success => self.succeeded += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped => self.skipped += 1,
            StepStatus::Pending => {}
        }
    }
}

/// Which terminal results an operator wants re-attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RetryPolicy {
    /// Terminal results are permanent.
    #[default]
    None,
    Failed,
    FailedAndSkipped,
}

impl RetryPolicy {
    fn matches(self, status: StepStatus) -> bool {
        match self {
            RetryPolicy::None => false,
            RetryPolicy::Failed => status == StepStatus::Failed,
            RetryPolicy::FailedAndSkipped => {
                matches!(status, StepStatus::Failed | StepStatus::Skipped)
            }
        }
    }

    /// Put matching results of `step` back to pending. Returns how many were reset.
    pub fn apply(self, store: &mut EntityStore, step: StepName) -> usize {
        if self == RetryPolicy::None {
            return 0;
        }
        let mut reset = 0;
        for game in store.iter_mut() {
            if self.matches(game.status(step)) {
                game.reset_step(step);
                reset += 1;
            }
        }
        if reset > 0 {
            info!(step = %step, reset, policy = ?self, "retry policy re-queued games");
        }
        reset
    }
}

pub struct StepRunner<'a> {
    snapshot: &'a SnapshotFile,
    checkpoint_every: usize,
}

impl<'a> StepRunner<'a> {
    pub fn new(snapshot: &'a SnapshotFile, checkpoint_every: usize) -> Self {
        Self {
            snapshot,
            checkpoint_every: checkpoint_every.max(1),
        }
    }

    /// Run `step` over every eligible game, in store order, one at a time.
    pub async fn run(
        &self,
        store: &mut EntityStore,
        step: &dyn EnrichmentStep,
    ) -> Result<StepReport, SnapshotError> {
        let name = step.name();
        let eligible: Vec<u32> = store
            .iter()
            .filter(|g| step.is_eligible(g))
            .map(|g| g.steam_app_id)
            .collect();
        let mut report = StepReport::new(name);
        report.eligible = eligible.len();
        info!(step = %name, pending = eligible.len(), "enrichment step starting");

        for (idx, app_id) in eligible.iter().copied().enumerate() {
            if idx > 0 {
                pause(step.throttle()).await;
            }
            let Some(game) = store.get_mut(app_id) else {
                continue;
            };
            debug!(step = %name, app_id, n = idx + 1, of = eligible.len(), game = %game.name, "enriching");

            let outcome = match step.enrich(game).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(step = %name, app_id, error = %e, "enrichment error");
                    StepOutcome::Failed(format!("{e:#}"))
                }
            };
            let status = outcome.status();
            if game.complete_step(name, outcome, Utc::now()) {
                report.record(status);
            } else {
                warn!(step = %name, app_id, "step result already terminal; outcome dropped");
            }
            report.processed += 1;

            if report.processed % self.checkpoint_every == 0 {
                self.snapshot.save(store)?;
                debug!(step = %name, processed = report.processed, "checkpoint");
            }
        }

        self.snapshot.save(store)?;
        info!(
            step = %name,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "enrichment step complete"
        );
        Ok(report)
    }
}
