//! Kommun News CLI
//!
//! Local entry point for crawling, querying and serving stored articles.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kommun_news::{
    error::Result,
    models::Config,
    pipeline,
    services::{ArticleExtractor, NewsCrawler},
    storage::{NewsStore, SqliteStore},
};

/// Kommun News - Municipal News Crawler
#[derive(Parser, Debug)]
#[command(
    name = "kommun-news",
    version,
    about = "Crawl, store and search municipal news"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Init,

    /// Crawl the news site and store the articles
    Ingest {
        /// Maximum number of articles to attempt (default from config)
        #[arg(long, conflicts_with = "all", allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Attempt every article found on the listing page
        #[arg(long)]
        all: bool,
    },

    /// Print stored articles, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Full-text search over stored articles
    Search {
        query: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Serve the JSON API
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind (default from config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve the effective ingest limit. Negative limits attempt nothing.
fn ingest_limit(limit: Option<i64>, all: bool, default: Option<usize>) -> Option<usize> {
    if all {
        return None;
    }
    limit
        .map(|n| usize::try_from(n.max(0)).unwrap_or(usize::MAX))
        .or(default)
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let store = SqliteStore::open(&config.storage).await?;
    store.initialize().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Init => {
            open_store(&config).await?;
            log::info!("Database ready at {}", config.storage.db_path.display());
        }

        Command::Ingest { limit, all } => {
            let limit = ingest_limit(limit, all, config.ingest.default_limit);

            let store = open_store(&config).await?;
            let crawler = NewsCrawler::new(&config)?;
            let summary = pipeline::run_ingest(&crawler, &store, limit).await?;

            println!("Ingested {} items", summary.stored);
        }

        Command::List { limit, offset } => {
            let store = open_store(&config).await?;
            let items = store.list(limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }

        Command::Search {
            query,
            limit,
            offset,
        } => {
            let store = open_store(&config).await?;
            let page = store.search(&query, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }

        #[cfg(feature = "server")]
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            kommun_news::server::run_server(&config, &bind).await?;
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            let config = Config::load(&cli.config)?;
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            ArticleExtractor::new(&config.extractor, &config.site.municipality)?;
            log::info!("Config OK ({} list paths)", config.site.list_paths.len());
        }
    }

    Ok(())
}
