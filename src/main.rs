use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use turnbased_catalog::catalog::StepName;
use turnbased_catalog::config::CatalogConfig;
use turnbased_catalog::pipeline::{Pipeline, PipelineOptions, RetryPolicy};
use turnbased_catalog::logging::init_tracing;
use turnbased_catalog::util::env::init_env;

#[derive(Parser, Debug)]
#[command(
    name = "catalog",
    version,
    about = "Discover, enrich and export turn-based card games"
)]
struct Cli {
    /// Skip discovery and work from the existing snapshot
    #[arg(long)]
    skip_extract: bool,
    /// Skip the enrichment steps
    #[arg(long)]
    skip_enhance: bool,
    /// Skip the CSV export
    #[arg(long)]
    skip_export: bool,
    /// Run only this enrichment step
    #[arg(long, value_enum)]
    only_step: Option<StepName>,
    /// Cap on new games taken from each Steam search
    #[arg(long)]
    steam_count: Option<usize>,
    /// Re-queue terminal step results before running each step
    #[arg(long, value_enum, default_value_t = RetryPolicy::None)]
    retry: RetryPolicy,
    /// Directory for games.json and games.csv (overrides CATALOG_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    init_tracing("info")?;
    let cli = Cli::parse();

    let config = CatalogConfig::from_env().with_output_dir(cli.output_dir);
    let opts = PipelineOptions {
        skip_extract: cli.skip_extract,
        skip_enhance: cli.skip_enhance,
        skip_export: cli.skip_export,
        only_step: cli.only_step,
        steam_search_count: cli.steam_count,
        retry: cli.retry,
    };

    let pipeline = Pipeline::live(config, &opts)?;
    let summary = pipeline.run(&opts).await?;
    info!(
        discovered = summary.discovery.iter().map(|r| r.merge.created).sum::<usize>(),
        steps = summary.steps.len(),
        exported = ?summary.exported,
        elapsed_secs = summary.elapsed.as_secs(),
        "done"
    );
    Ok(())
}
