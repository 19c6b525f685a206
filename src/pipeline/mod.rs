//! End-to-end run: discover, enrich, export. Each phase starts from the
//! snapshot on disk so any phase can be run on its own.
pub mod runner;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::{discover_from, DiscoveryPacing, DiscoveryReport, DiscoverySource, SnapshotFile, StepName};
use crate::config::CatalogConfig;
use crate::export::{export_csv, CatalogSummary};
use crate::providers::metacritic::MetacriticClient;
use crate::providers::steam::{SteamSearchSource, SteamStoreClient};
use crate::providers::turnbasedlovers::TurnBasedLoversSource;
use crate::providers::{HeaderRotation, HttpClient};
use crate::steps::{MetacriticStep, SteamStep};

pub use runner::{EnrichmentStep, RetryPolicy, StepReport, StepRunner};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub skip_extract: bool,
    pub skip_enhance: bool,
    pub skip_export: bool,
    pub only_step: Option<StepName>,
    /// Cap on new games per Steam search.
    pub steam_search_count: Option<usize>,
    pub retry: RetryPolicy,
}

#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub discovery: Vec<DiscoveryReport>,
    pub steps: Vec<StepReport>,
    pub exported: Option<usize>,
    pub catalog: Option<CatalogSummary>,
    pub elapsed: Duration,
}

pub struct Pipeline {
    config: CatalogConfig,
    snapshot: SnapshotFile,
    sources: Vec<(Box<dyn DiscoverySource>, DiscoveryPacing)>,
    steps: Vec<Box<dyn EnrichmentStep>>,
}

impl Pipeline {
    /// `steps` run in the given order; later steps may depend on earlier ones.
    pub fn new(
        config: CatalogConfig,
        sources: Vec<(Box<dyn DiscoverySource>, DiscoveryPacing)>,
        steps: Vec<Box<dyn EnrichmentStep>>,
    ) -> Self {
        let snapshot = SnapshotFile::new(config.snapshot_path());
        Self {
            config,
            snapshot,
            sources,
            steps,
        }
    }

    /// Pipeline wired to the live Steam, turnbasedlovers and Metacritic sites.
    pub fn live(config: CatalogConfig, opts: &PipelineOptions) -> Result<Self> {
        let http = Arc::new(HttpClient::new(config.http_timeout, HeaderRotation::browsers())?);

        let sources: Vec<(Box<dyn DiscoverySource>, DiscoveryPacing)> = vec![
            (
                Box::new(
                    SteamSearchSource::new(http.clone()).with_target_cap(opts.steam_search_count),
                ) as Box<dyn DiscoverySource>,
                DiscoveryPacing {
                    page_delay: config.discovery_page_delay,
                    query_delay: config.discovery_query_delay,
                },
            ),
            (
                Box::new(TurnBasedLoversSource::new(http.clone())) as Box<dyn DiscoverySource>,
                DiscoveryPacing {
                    page_delay: config.discovery_page_delay,
                    query_delay: config.tbl_list_delay,
                },
            ),
        ];
        let steps: Vec<Box<dyn EnrichmentStep>> = vec![
            Box::new(SteamStep::new(
                SteamStoreClient::new(http.clone()),
                config.steam_step_delay,
                config.steam_reviews_delay,
            )) as Box<dyn EnrichmentStep>,
            Box::new(MetacriticStep::new(
                MetacriticClient::new(http),
                config.metacritic_step_delay,
                config.metacritic_page_delay,
            )),
        ];
        Ok(Self::new(config, sources, steps))
    }

    pub fn snapshot(&self) -> &SnapshotFile {
        &self.snapshot
    }

    pub async fn run(&self, opts: &PipelineOptions) -> Result<PipelineSummary> {
        let started = Instant::now();
        let mut summary = PipelineSummary::default();
        info!(
            snapshot = %self.snapshot.path().display(),
            skip_extract = opts.skip_extract,
            skip_enhance = opts.skip_enhance,
            skip_export = opts.skip_export,
            only_step = ?opts.only_step,
            "pipeline starting"
        );

        if !opts.skip_extract {
            summary.discovery = self.discover().await?;
        }
        if !opts.skip_enhance {
            summary.steps = self.enhance(opts).await?;
        }
        if !opts.skip_export {
            let (exported, catalog) = self.export()?;
            summary.exported = Some(exported);
            summary.catalog = Some(catalog);
        }

        summary.elapsed = started.elapsed();
        info!(elapsed_secs = summary.elapsed.as_secs(), "pipeline complete");
        Ok(summary)
    }

    async fn discover(&self) -> Result<Vec<DiscoveryReport>> {
        info!("phase: discovery");
        let mut store = self.snapshot.load()?;
        let before = store.len();
        let mut reports = Vec::with_capacity(self.sources.len());
        for (source, pacing) in &self.sources {
            let report = discover_from(source.as_ref(), &mut store, &self.snapshot, pacing)
                .await
                .with_context(|| format!("discovery from {}", source.name()))?;
            reports.push(report);
        }
        self.snapshot.save(&mut store)?;
        info!(total = store.len(), new = store.len() - before, "discovery complete");
        Ok(reports)
    }

    async fn enhance(&self, opts: &PipelineOptions) -> Result<Vec<StepReport>> {
        info!("phase: enrichment");
        let mut store = self.snapshot.load()?;
        let runner = StepRunner::new(&self.snapshot, self.config.checkpoint_every);
        let mut reports = Vec::new();
        for step in &self.steps {
            let name = step.name();
            if opts.only_step.is_some_and(|only| only != name) {
                continue;
            }
            opts.retry.apply(&mut store, name);
            reports.push(runner.run(&mut store, step.as_ref()).await?);
        }
        Ok(reports)
    }

    fn export(&self) -> Result<(usize, CatalogSummary)> {
        info!("phase: export");
        let store = self.snapshot.load()?;
        let exported = export_csv(&store, &self.config.export_path())?;
        let catalog = CatalogSummary::of(&store);
        catalog.log();
        Ok((exported, catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Discovered, DiscoveryPage, DiscoveryQuery, GameRecord, SnapshotError, StepOutcome, StepStatus,
    };
    use async_trait::async_trait;

    struct OneList(Vec<(u32, &'static str)>);

    #[async_trait]
    impl DiscoverySource for OneList {
        fn name(&self) -> &str {
            "fake"
        }

        async fn queries(&self) -> Result<Vec<DiscoveryQuery>> {
            Ok(vec![DiscoveryQuery {
                label: "list".into(),
                locator: "list".into(),
                source_tag: "turnbasedlovers".into(),
                target: None,
            }])
        }

        async fn fetch_page(&self, query: &DiscoveryQuery, _cursor: usize) -> Result<DiscoveryPage> {
            Ok(DiscoveryPage {
                candidates: self
                    .0
                    .iter()
                    .map(|(id, name)| Discovered::new(*id, *name, query.source_tag.clone()))
                    .collect(),
                next: None,
            })
        }
    }

    /// Accepts even app ids, fills review counts from the id.
    struct ParityStep;

    #[async_trait]
    impl EnrichmentStep for ParityStep {
        fn name(&self) -> StepName {
            StepName::Steam
        }

        async fn enrich(&self, game: &mut GameRecord) -> Result<StepOutcome> {
            game.total_reviews = Some(game.steam_app_id as u64);
            Ok(if game.steam_app_id % 2 == 0 {
                StepOutcome::Success
            } else {
                StepOutcome::Skipped("Not a card/deckbuilding game".into())
            })
        }
    }

    fn pipeline(dir: &std::path::Path) -> Pipeline {
        let config = CatalogConfig::default().with_output_dir(Some(dir.to_path_buf()));
        Pipeline::new(
            config,
            vec![(
                Box::new(OneList(vec![(2, "Two"), (3, "Three"), (4, "Four")])) as Box<dyn DiscoverySource>,
                DiscoveryPacing::default(),
            )],
            vec![Box::new(ParityStep) as Box<dyn EnrichmentStep>],
        )
    }

    #[tokio::test]
    async fn full_run_discovers_enriches_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());

        let summary = p.run(&PipelineOptions::default()).await.unwrap();

        assert_eq!(summary.discovery[0].merge.created, 3);
        assert_eq!(summary.steps[0].succeeded, 2);
        assert_eq!(summary.exported, Some(2));
        let catalog = summary.catalog.unwrap();
        assert_eq!((catalog.total, catalog.steam_ok), (3, 2));

        let csv = std::fs::read_to_string(dir.path().join("games.csv")).unwrap();
        let ids: Vec<&str> = csv.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(ids, vec!["4", "2"]);
    }

    #[tokio::test]
    async fn snapshot_write_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("games.json.tmp")).unwrap();
        let p = pipeline(dir.path());

        let err = p.run(&PipelineOptions::default()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::Write { .. })
        ));
        assert!(!dir.path().join("games.csv").exists());
    }

    #[tokio::test]
    async fn phases_can_be_skipped_and_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());

        let first = p
            .run(&PipelineOptions {
                skip_enhance: true,
                skip_export: true,
                ..PipelineOptions::default()
            })
            .await
            .unwrap();
        assert!(first.steps.is_empty());
        assert!(!dir.path().join("games.csv").exists());
        let store = p.snapshot().load().unwrap();
        assert_eq!(store.count_status(StepName::Steam, StepStatus::Pending), 3);

        let second = p
            .run(&PipelineOptions {
                skip_extract: true,
                ..PipelineOptions::default()
            })
            .await
            .unwrap();
        assert!(second.discovery.is_empty());
        assert_eq!(second.steps[0].processed, 3);
        assert_eq!(second.exported, Some(2));
    }

    #[tokio::test]
    async fn only_step_filters_and_retry_requeues() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        p.run(&PipelineOptions::default()).await.unwrap();

        let skipped_other = p
            .run(&PipelineOptions {
                skip_extract: true,
                skip_export: true,
                only_step: Some(StepName::Metacritic),
                retry: RetryPolicy::FailedAndSkipped,
                ..PipelineOptions::default()
            })
            .await
            .unwrap();
        assert!(skipped_other.steps.is_empty());

        let retried = p
            .run(&PipelineOptions {
                skip_extract: true,
                skip_export: true,
                only_step: Some(StepName::Steam),
                retry: RetryPolicy::FailedAndSkipped,
                ..PipelineOptions::default()
            })
            .await
            .unwrap();
        assert_eq!(retried.steps[0].processed, 1);
        assert_eq!(retried.steps[0].skipped, 1);
    }
}
