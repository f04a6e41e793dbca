use anyhow::Context;
use clap::{Parser, Subcommand};
use fin_scraper::apis::{self, webank::WeBankPartnerScraper};
use fin_scraper::config::{Config, DEFAULT_CONFIG_PATH};
use fin_scraper::constants;
use fin_scraper::db::Database;
use fin_scraper::fetch::{HttpFetcher, PageFetcher};
use fin_scraper::logging;
use fin_scraper::metrics;
use fin_scraper::pacer::Pacer;
use fin_scraper::pipeline::{CrawlOptions, Pipeline};
use fin_scraper::processor::Processor;
use fin_scraper::types::{SiteAdapter, Summary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fin_scraper")]
#[command(about = "Financial product catalog and return-history scraper")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the SQLite database path from the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Write a Prometheus text snapshot of the run's metrics to this file
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the products and daily_returns tables
    InitDb,
    /// List the financial partners published by WeBank
    ListPartners,
    /// Crawl one partner (adapter name such as `icbc`, or the company name)
    Run {
        #[arg(long)]
        company: String,
        /// Maximum number of catalog products to crawl
        #[arg(long)]
        max_products: Option<usize>,
    },
    /// Crawl every partner with an adapter
    RunAll {
        /// Maximum number of catalog products to crawl per partner
        #[arg(long)]
        max_products: Option<usize>,
    },
}

/// Crawl one adapter and persist the result through a database handle scoped to this run.
#[tracing::instrument(skip_all, fields(adapter = %adapter.name()))]
async fn run_adapter(
    adapter: &dyn SiteAdapter,
    config: &Config,
    db_path: &Path,
    max_products: Option<usize>,
) -> anyhow::Result<Summary> {
    let mut pipeline = Pipeline::new(CrawlOptions::from_config(&config.crawl, max_products));
    let result = pipeline.run(adapter).await;

    let mut db = Database::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    db.init_schema()?;
    let summary = Processor::new(&mut db).process(&result)?;
    db.close()?;

    Ok(summary)
}

fn print_summary(summary: &Summary) {
    println!("\n📊 Results for {}:", summary.company_name);
    println!("   Products:         {}", summary.products_count);
    println!("   New products:     {}", summary.products_new);
    println!("   Updated products: {}", summary.products_updated);
    println!("   Return rows:      {}", summary.returns_count);
    println!("   New return rows:  {}", summary.returns_new);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.database.path));

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.http)?);
    let pacer = Pacer::from_config(&config.crawl);

    match cli.command {
        Commands::InitDb => {
            println!("🔄 Initializing database at {}...", db_path.display());
            let db = Database::open(&db_path)?;
            db.init_schema()?;
            db.close()?;
            println!("✅ Database initialized");
        }
        Commands::ListPartners => {
            let partners = WeBankPartnerScraper::new(fetcher).get_partners().await;
            println!("Found {} partners:", partners.len());
            for (i, partner) in partners.iter().enumerate() {
                println!("{}. {} - {}", i + 1, partner.name, partner.url);
            }
        }
        Commands::Run {
            company,
            max_products,
        } => {
            let Some(adapter) = apis::find_adapter(&company, fetcher, pacer) else {
                warn!("Unknown adapter specified: {}", company);
                println!(
                    "⚠️  No adapter for '{}'. Available: {}",
                    company,
                    constants::get_supported_adapters().join(", ")
                );
                return Ok(());
            };

            info!("Running adapter {}", adapter.name());
            let summary = run_adapter(adapter.as_ref(), &config, &db_path, max_products).await?;
            print_summary(&summary);
        }
        Commands::RunAll { max_products } => {
            let mut summaries = Vec::new();
            for adapter in apis::all_adapters(fetcher, pacer) {
                info!("Running adapter {}", adapter.name());
                let summary =
                    run_adapter(adapter.as_ref(), &config, &db_path, max_products).await?;
                summaries.push(summary);
            }

            println!("\n✅ All adapters finished");
            for summary in &summaries {
                print_summary(summary);
            }
        }
    }

    if let Some(path) = &cli.metrics_out {
        metrics::write_snapshot(path)
            .with_context(|| format!("writing metrics snapshot {}", path.display()))?;
    }

    Ok(())
}
