use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bearmap_common::Config;
use bearmap_ingest::adapters::{
    FetchOptions, GisPortalAdapter, KumadasCsvAdapter, KumapAdapter, NewsLinksAdapter,
    PdfReportAdapter, SourceAdapter,
};
use bearmap_ingest::maintenance::{
    backfill_prefecture_urls, find_existing_duplicates, remove_duplicates, RetentionPolicy,
};
use bearmap_ingest::{Coordinator, DedupConfig, DedupEngine, PgStore, SightingStore};
use browserless_client::BrowserlessClient;
use kumap_client::KumapClient;

/// Scripted GIS sessions click through agreement pages and paginate;
/// they need far more headroom than a plain fetch.
const BROWSER_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "bearmap-ingest", about = "Bear sighting ingestion and dedup pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct IngestArgs {
    /// Only keep records newer than this many days.
    #[arg(long)]
    days_back: Option<i64>,

    /// Fetch and classify but persist nothing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum KeepSide {
    /// Keep the earliest-inserted row of each duplicate pair.
    #[default]
    Oldest,
    /// Keep the latest-inserted row of each duplicate pair.
    Newest,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the news digest page for per-prefecture advisory links.
    NewsLinks {
        #[command(flatten)]
        common: IngestArgs,
    },
    /// Import the Akita open-data CSV.
    KumadasCsv {
        #[command(flatten)]
        common: IngestArgs,
    },
    /// Scrape the Kyoto GIS portal through a headless browser.
    GisPortal {
        /// Fiscal-year layers to scrape, e.g. R7 R6 R5.
        #[arg(long, value_delimiter = ',')]
        fiscal_years: Vec<String>,

        #[command(flatten)]
        common: IngestArgs,
    },
    /// Import a pre-parsed prefecture PDF report (JSON file).
    PdfReport {
        /// Path to the parsed report file.
        #[arg(long)]
        file: std::path::PathBuf,

        /// Published report page the rows link back to.
        #[arg(long)]
        report_url: Option<String>,

        #[command(flatten)]
        common: IngestArgs,
    },
    /// Import user reports from the Kumap API.
    Kumap {
        /// Restrict to one prefecture instead of a date window.
        #[arg(long)]
        prefecture: Option<String>,

        #[command(flatten)]
        common: IngestArgs,
    },
    /// Scan persisted rows for duplicate pairs without deleting.
    FindDuplicates,
    /// Delete one side of each persisted duplicate pair.
    RemoveDuplicates {
        #[arg(long, value_enum, default_value = "oldest")]
        keep: KeepSide,
    },
    /// Point prefecture placeholder rows at curated map URLs.
    BackfillUrls,
}

fn fetch_options(common: &IngestArgs) -> FetchOptions {
    FetchOptions {
        days_back: common.days_back,
        prefecture: None,
        dry_run: common.dry_run,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bearmap=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store: Option<Arc<dyn SightingStore>> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            Some(Arc::new(store) as Arc<dyn SightingStore>)
        }
        None => None,
    };

    let dedup = DedupEngine::new(DedupConfig::default());
    let coordinator = Coordinator::new(store.clone(), dedup, &config.data_dir);

    match cli.command {
        Command::NewsLinks { common } => {
            let adapter = NewsLinksAdapter::new(reqwest::Client::new());
            run_ingest(&coordinator, &adapter, &fetch_options(&common)).await?;
        }
        Command::KumadasCsv { common } => {
            let adapter = KumadasCsvAdapter::new(reqwest::Client::new());
            run_ingest(&coordinator, &adapter, &fetch_options(&common)).await?;
        }
        Command::GisPortal { fiscal_years, common } => {
            let browserless = BrowserlessClient::with_timeout(
                &config.browserless_url,
                config.browserless_token.as_deref(),
                BROWSER_SESSION_TIMEOUT,
            );
            let mut adapter = GisPortalAdapter::new(browserless);
            if !fiscal_years.is_empty() {
                adapter = adapter.with_fiscal_years(fiscal_years);
            }
            run_ingest(&coordinator, &adapter, &fetch_options(&common)).await?;
        }
        Command::PdfReport { file, report_url, common } => {
            let mut adapter = PdfReportAdapter::new(file);
            if let Some(url) = report_url {
                adapter = adapter.with_report_url(url);
            }
            run_ingest(&coordinator, &adapter, &fetch_options(&common)).await?;
        }
        Command::Kumap { prefecture, common } => {
            let api_key = config.kumap_api_key.clone().unwrap_or_default();
            let adapter = KumapAdapter::new(KumapClient::new(api_key));
            let mut opts = fetch_options(&common);
            opts.prefecture = prefecture;
            run_ingest(&coordinator, &adapter, &opts).await?;
        }
        Command::FindDuplicates => {
            let store = require_store(&store)?;
            let pairs = find_existing_duplicates(store.as_ref(), &dedup.config()).await?;
            for pair in &pairs {
                info!(
                    older_id = pair.older_id,
                    newer_id = pair.newer_id,
                    reason = %pair.reason,
                    "Duplicate pair"
                );
            }
            println!("{} duplicate pair(s) found", pairs.len());
        }
        Command::RemoveDuplicates { keep } => {
            let store = require_store(&store)?;
            let policy = match keep {
                KeepSide::Oldest => RetentionPolicy::KeepOldest,
                KeepSide::Newest => RetentionPolicy::KeepNewest,
            };
            let pairs = find_existing_duplicates(store.as_ref(), &dedup.config()).await?;
            let removed = remove_duplicates(store.as_ref(), &pairs, policy).await?;
            println!("{removed} duplicate row(s) removed");
        }
        Command::BackfillUrls => {
            let store = require_store(&store)?;
            let report = backfill_prefecture_urls(store.as_ref()).await?;
            println!("{} updated, {} skipped", report.updated, report.skipped);
        }
    }

    Ok(())
}

fn require_store(store: &Option<Arc<dyn SightingStore>>) -> Result<Arc<dyn SightingStore>> {
    match store {
        Some(store) => Ok(store.clone()),
        None => bail!("DATABASE_URL is required for maintenance commands"),
    }
}

async fn run_ingest(
    coordinator: &Coordinator,
    adapter: &dyn SourceAdapter,
    opts: &FetchOptions,
) -> Result<()> {
    let report = coordinator.run(adapter, opts).await?;
    println!("{}: {report}", adapter.name());
    Ok(())
}
