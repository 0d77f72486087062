use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use demeter_client::{
    CollectionScraper, DatasetScraper, HubClient, ModelScraper, OrganizationScraper,
};
use demeter_core::traits::{ItemStore, Scraper};
use demeter_core::{Pipeline, PipelineConfig, TracingReporter};
use demeter_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "demeter", version, about = "Two-phase catalog metadata harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ItemKind {
    Models,
    Datasets,
    Organizations,
    Collections,
}

impl ItemKind {
    const ALL: [ItemKind; 4] = [
        ItemKind::Models,
        ItemKind::Datasets,
        ItemKind::Organizations,
        ItemKind::Collections,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ItemKind::Models => "models",
            ItemKind::Datasets => "datasets",
            ItemKind::Organizations => "organizations",
            ItemKind::Collections => "collections",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest one item kind through both phases
    Scrape {
        /// Item kind to harvest
        #[arg(short, long, value_enum)]
        kind: ItemKind,

        /// Stop enumerating after this many summaries
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep only summaries carrying at least one of these tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Exact dataset ids to find via search instead of a full listing
        /// (datasets only)
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<String>>,

        /// Detail requests allowed per limiter key per 60-second window
        #[arg(long, default_value_t = 10)]
        rate_limit: u32,

        /// Summaries accumulated per bulk upsert
        #[arg(long, default_value_t = 64)]
        batch_size: usize,

        /// Minimum upvotes for a collection to be harvested
        /// (collections only)
        #[arg(long, default_value_t = 100)]
        min_upvotes: u64,

        /// Skip enumeration and drain the existing task backlog
        #[arg(long, default_value_t = false)]
        resume: bool,

        /// Catalog hub base URL
        #[arg(
            long,
            env = "DEMETER_HUB_URL",
            default_value = demeter_client::DEFAULT_HUB_URL
        )]
        hub_url: String,
    },

    /// Show harvest counters per item kind
    Stats {
        /// Restrict to one kind (all four by default)
        #[arg(short, long, value_enum)]
        kind: Option<ItemKind>,
    },
}

struct ScrapeOptions {
    limit: Option<usize>,
    tags: Option<Vec<String>>,
    ids: Option<Vec<String>>,
    min_upvotes: u64,
    resume: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("demeter=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            kind,
            limit,
            tags,
            ids,
            rate_limit,
            batch_size,
            min_upvotes,
            resume,
            hub_url,
        } => {
            if ids.is_some() && kind != ItemKind::Datasets {
                anyhow::bail!("--ids is only supported with --kind datasets");
            }
            let db = connect_db().await?;
            let hub = HubClient::with_base_url(&hub_url).map_err(|e| anyhow::anyhow!(e))?;
            let config = PipelineConfig::default()
                .with_batch_size(batch_size)
                .with_rate_limit(rate_limit);
            let options = ScrapeOptions {
                limit,
                tags,
                ids,
                min_upvotes,
                resume,
            };
            cmd_scrape(kind, hub, &db, config, options).await?;
        }
        Commands::Stats { kind } => {
            let db = connect_db().await?;
            cmd_stats(kind, &db).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

async fn cmd_scrape(
    kind: ItemKind,
    hub: HubClient,
    db: &Database,
    config: PipelineConfig,
    options: ScrapeOptions,
) -> Result<()> {
    let limiter = db.rate_limiter();
    let rate_limit = config.rate_limit;

    tracing::info!(kind = kind.as_str(), resume = options.resume, "Starting harvest");

    match kind {
        ItemKind::Models => {
            let scraper = ModelScraper::new(hub, limiter, rate_limit)
                .with_limit(options.limit)
                .with_tags(options.tags);
            run_pipeline(scraper, db, config, options.resume).await?;
        }
        ItemKind::Datasets => {
            let scraper = DatasetScraper::new(hub, limiter, rate_limit)
                .with_limit(options.limit)
                .with_tags(options.tags)
                .with_resource_ids(options.ids);
            run_pipeline(scraper, db, config, options.resume).await?;
        }
        ItemKind::Organizations => {
            let scraper = OrganizationScraper::new(hub, limiter, db.item_repo(), rate_limit);
            run_pipeline(scraper, db, config, options.resume).await?;
        }
        ItemKind::Collections => {
            let scraper = CollectionScraper::new(hub, limiter, db.item_repo(), rate_limit)
                .with_min_upvotes(options.min_upvotes);
            run_pipeline(scraper, db, config, options.resume).await?;
        }
    }

    print_stats_row_header();
    print_stats_row(kind, db).await?;

    Ok(())
}

async fn run_pipeline<S: Scraper>(
    scraper: S,
    db: &Database,
    config: PipelineConfig,
    resume: bool,
) -> Result<()> {
    let pipeline = Pipeline::new(scraper, db.item_repo(), db.task_queue(), config);
    let result = if resume {
        pipeline.resume(&TracingReporter).await
    } else {
        pipeline.run(&TracingReporter).await
    };
    result.map_err(|e| anyhow::anyhow!(e))
}

async fn cmd_stats(kind: Option<ItemKind>, db: &Database) -> Result<()> {
    print_stats_row_header();
    match kind {
        Some(kind) => print_stats_row(kind, db).await?,
        None => {
            for kind in ItemKind::ALL {
                print_stats_row(kind, db).await?;
            }
        }
    }
    Ok(())
}

fn print_stats_row_header() {
    println!(
        "{:<16} {:>8} {:>8} {:>8}",
        "kind", "total", "basic", "extended"
    );
}

async fn print_stats_row(kind: ItemKind, db: &Database) -> Result<()> {
    let stats = db
        .item_repo()
        .stats(kind.as_str())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "{:<16} {:>8} {:>8} {:>8}",
        kind.as_str(),
        stats.total,
        stats.basic,
        stats.extended
    );
    Ok(())
}
