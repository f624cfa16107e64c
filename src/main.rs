use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offerhound::config::{Config, PacingConfig};
use offerhound::crawler::{CatalogService, Orchestrator};
use offerhound::render::{Renderer, SnapshotRenderer, SnapshotSite};
use offerhound::storage::checkpoint::{CrawlStateStore, JsonStateFile};

#[derive(Parser)]
#[command(
    name = "offerhound",
    version,
    about = "Resumable, rate-limited product-catalog crawler for 1688.com listings",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults to OFFERHOUND_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Replay captured HTML from a snapshot directory instead of a browser
    #[arg(long, global = true)]
    snapshots: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the search listing for a term
    Listing {
        /// Search term
        #[arg(short, long)]
        term: String,
    },

    /// Crawl one product detail page
    Detail {
        /// Detail page URL
        #[arg(short, long)]
        url: String,

        /// Offer id the detail belongs to
        #[arg(short, long)]
        offer_id: String,
    },

    /// Search the catalog, crawling the listing when nothing is stored
    Search {
        /// Search term
        term: String,

        /// 1-based result page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Results per page (1-100)
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show one product, crawling its details when missing
    Product {
        /// Offer id
        offer_id: String,
    },

    /// Inspect or reset the stored crawl progress
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the stored crawl state
    Show,
    /// Forget the stored crawl state
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("offerhound starting");

    match cli.command {
        Commands::Listing { term } => {
            tracing::info!(term = %term, "Starting listing command");
            let orchestrator = build_orchestrator(&mut config, cli.snapshots.as_deref()).await?;
            let report = orchestrator.run_listing_crawl(&term).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Detail { url, offer_id } => {
            tracing::info!(url = %url, offer_id = %offer_id, "Starting detail command");
            let orchestrator = build_orchestrator(&mut config, cli.snapshots.as_deref()).await?;
            let report = orchestrator.run_detail_crawl(&url, &offer_id).await?;
            for (section, status) in &report.sections {
                println!("{section:>16}: {status}");
            }
            println!("{}", serde_json::to_string_pretty(&report.detail)?);
        }

        Commands::Search { term, page, limit } => {
            tracing::info!(term = %term, page, limit, "Starting search command");
            let orchestrator = build_orchestrator(&mut config, cli.snapshots.as_deref()).await?;
            let service = CatalogService::new(Arc::new(orchestrator));
            let results = service.search(&term, page, limit).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Commands::Product { offer_id } => {
            tracing::info!(offer_id = %offer_id, "Starting product command");
            let orchestrator = build_orchestrator(&mut config, cli.snapshots.as_deref()).await?;
            let service = CatalogService::new(Arc::new(orchestrator));
            match service.product(&offer_id).await? {
                Some(product) => println!("{}", serde_json::to_string_pretty(&product)?),
                None => anyhow::bail!("No product with offer id {offer_id}"),
            }
        }

        Commands::State { action } => {
            let store = JsonStateFile::new(&config.storage.state_file);
            match action {
                StateAction::Show => {
                    let state = store.load().await?;
                    println!("{}", serde_json::to_string_pretty(&state)?);
                }
                StateAction::Reset => {
                    store.reset().await?;
                    println!("Crawl state reset: {}", store.path().display());
                }
            }
        }
    }

    tracing::info!("offerhound completed successfully");
    Ok(())
}

async fn build_orchestrator(config: &mut Config, snapshots: Option<&Path>) -> Result<Orchestrator> {
    let renderer: Arc<dyn Renderer> = match snapshots {
        Some(dir) => {
            let site = SnapshotSite::from_dir(dir)
                .await
                .with_context(|| format!("Failed to load snapshots from {}", dir.display()))?;
            tracing::info!(dir = %dir.display(), documents = site.len(), "Replaying snapshots");
            config.pacing = PacingConfig {
                image_rate_per_sec: config.pacing.image_rate_per_sec,
                image_timeout_secs: config.pacing.image_timeout_secs,
                ..PacingConfig::instant()
            };
            Arc::new(SnapshotRenderer::new(site))
        }
        None => browser_renderer()?,
    };

    Orchestrator::from_config(config.clone(), renderer)
}

#[cfg(feature = "chromium")]
fn browser_renderer() -> Result<Arc<dyn Renderer>> {
    Ok(Arc::new(offerhound::render::chromium::ChromiumRenderer::new()))
}

#[cfg(not(feature = "chromium"))]
fn browser_renderer() -> Result<Arc<dyn Renderer>> {
    anyhow::bail!("No browser backend in this build: pass --snapshots <dir> or rebuild with --features chromium")
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("offerhound=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("offerhound={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
