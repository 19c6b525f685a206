//! Hit one upstream source and print what the parsers make of it.
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use turnbased_catalog::catalog::{DiscoveryQuery, DiscoverySource};
use turnbased_catalog::config::CatalogConfig;
use turnbased_catalog::providers::metacritic::{MetacriticApi, MetacriticClient};
use turnbased_catalog::providers::steam::search::source_tag;
use turnbased_catalog::providers::steam::{SteamApi, SteamSearchSource, SteamStoreClient};
use turnbased_catalog::providers::turnbasedlovers::{TurnBasedLoversSource, SOURCE_TAG};
use turnbased_catalog::providers::{HeaderRotation, HttpClient};
use turnbased_catalog::logging::init_tracing;
use turnbased_catalog::util::env::init_env;

#[derive(Parser, Debug)]
#[command(name = "source_probe", version, about = "Probe catalog sources one request at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// One page of Steam search results for a tag combination
    SteamSearch {
        #[arg(long, default_value = "1666,9")]
        tags: String,
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// turnbasedlovers lists index, or the games on one list
    Tbl {
        /// List page URL; omit to print the index
        #[arg(long)]
        list: Option<String>,
    },
    /// Details, review summary and tags for one Steam app
    SteamApp { app_id: u32 },
    /// Metacritic search hit and page score for a game name
    Metacritic { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    init_tracing("warn")?;
    let cli = Cli::parse();

    let config = CatalogConfig::from_env();
    let http = Arc::new(HttpClient::new(config.http_timeout, HeaderRotation::browsers())?);

    match cli.command {
        Commands::SteamSearch { tags, start } => {
            let source = SteamSearchSource::new(http);
            let query = DiscoveryQuery {
                label: tags.clone(),
                source_tag: source_tag(&tags),
                locator: tags,
                target: None,
            };
            let page = source.fetch_page(&query, start).await?;
            for c in &page.candidates {
                println!("{:>8}  {}", c.app_id, c.name);
            }
            println!("[steam-search] {} results, next={:?}", page.candidates.len(), page.next);
        }
        Commands::Tbl { list: None } => {
            let source = TurnBasedLoversSource::new(http);
            for q in source.queries().await? {
                println!("{:<40} {}", q.label, q.locator);
            }
        }
        Commands::Tbl { list: Some(url) } => {
            let source = TurnBasedLoversSource::new(http);
            let query = DiscoveryQuery {
                label: url.clone(),
                locator: url,
                source_tag: SOURCE_TAG.to_string(),
                target: None,
            };
            let page = source.fetch_page(&query, 0).await?;
            for c in &page.candidates {
                println!("{:>8}  {}", c.app_id, c.name);
            }
            println!("[tbl] {} games", page.candidates.len());
        }
        Commands::SteamApp { app_id } => {
            let client = SteamStoreClient::new(http);
            let details = client
                .app_details(app_id)
                .await?
                .with_context(|| format!("app {app_id} not found"))?;
            println!("name:       {}", details.name.as_deref().unwrap_or("-"));
            println!("developers: {}", details.developers.join(", "));
            println!(
                "released:   {}",
                details.release_date.and_then(|r| r.date).unwrap_or_default()
            );
            if let Some(mc) = details.metacritic {
                println!("metacritic: {:?} {}", mc.score, mc.url.unwrap_or_default());
            }
            match client.app_reviews(app_id).await? {
                Some(r) => println!(
                    "reviews:    {} ({}/10, {} total)",
                    r.review_score_desc.unwrap_or_default(),
                    r.review_score,
                    r.total_reviews
                ),
                None => println!("reviews:    -"),
            }
            println!("tags:       {}", client.store_tags(app_id).await?.join(", "));
        }
        Commands::Metacritic { name } => {
            let client = MetacriticClient::new(http);
            let hit = client.search(&name).await?;
            println!("search: score={:?} url={:?}", hit.score, hit.url);
            if let (None, Some(url)) = (hit.score, hit.url.as_deref()) {
                println!("page:   score={:?}", client.page_score(url).await?);
            }
        }
    }
    Ok(())
}
