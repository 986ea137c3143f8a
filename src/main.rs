//! Lemmascope main entry point
//!
//! This is the command-line interface for the Lemmascope search engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use lemmascope::config::{load_config_with_hash, Config};
use lemmascope::output::{load_statistics, print_json, print_statistics};
use lemmascope::storage::{lock, open_storage, share};
use lemmascope::{Coordinator, LemmascopeError, SearchEngine, TextAnalyzer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code for conditions the user can act on, such as an empty query
const USER_ERROR_EXIT_CODE: i32 = 2;

/// Lemmascope: a self-hosted lemma search engine
///
/// Lemmascope crawls a fixed set of sites, indexes their pages by
/// normalized word forms and answers relevance-ranked keyword queries.
#[derive(Parser, Debug)]
#[command(name = "lemmascope")]
#[command(version)]
#[command(about = "A self-hosted lemma search engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl and index every configured site (Ctrl-C stops the run)
    Crawl,

    /// Fetch and reindex a single page of a configured site
    IndexPage {
        /// Absolute URL of the page
        url: String,
    },

    /// Search the index
    Search {
        /// Query text
        query: String,

        /// Restrict the search to one site origin
        #[arg(long)]
        site: Option<String>,

        /// Number of results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum number of results (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show index statistics
    Stats,

    /// Validate the configuration and show what would be crawled
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let result = match cli.command {
        Command::Crawl => handle_crawl(config).await,
        Command::IndexPage { url } => handle_index_page(config, &url).await,
        Command::Search {
            query,
            site,
            offset,
            limit,
        } => handle_search(config, &query, site.as_deref(), offset, limit),
        Command::Stats => handle_stats(&config),
        Command::Check => handle_check(&config),
    };

    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<LemmascopeError>() {
            if err.is_user_visible() {
                eprintln!("✗ {}", err);
                std::process::exit(USER_ERROR_EXIT_CODE);
            }
        }
    }
    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lemmascope=info,warn"),
            1 => EnvFilter::new("lemmascope=debug,info"),
            2 => EnvFilter::new("lemmascope=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles `crawl`: runs a full crawl, stopping it on Ctrl-C
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!("Sites to index: {}", config.sites.len());

    let coordinator = Arc::new(Coordinator::from_config(config)?);

    let stopper = Arc::clone(&coordinator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            match stopper.stop_crawl() {
                Ok(summary) => {
                    tracing::info!("Stopped {} sites", summary.stopped_sites.len())
                }
                Err(e) => tracing::warn!("Stop request ignored: {}", e),
            }
        }
    });

    let summary = coordinator.start_crawl().await?;
    print_json(&summary)?;
    Ok(())
}

/// Handles `index-page`: reindexes a single page
async fn handle_index_page(config: Config, url: &str) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config)?;
    let page = coordinator.index_single_page(url).await?;
    println!("✓ Indexed {} (HTTP {})", page.path, page.code);
    Ok(())
}

/// Handles `search`: prints a page of results as JSON
fn handle_search(
    config: Config,
    query: &str,
    site: Option<&str>,
    offset: usize,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let storage = share(open_storage(Path::new(&config.storage.database_path))?);
    let engine = SearchEngine::new(
        storage,
        TextAnalyzer::for_language(config.analyzer.language),
        &config.search,
    );

    let limit = limit.unwrap_or(config.search.default_limit);
    let response = engine.search(query, site, offset, limit)?;
    print_json(&response)?;
    Ok(())
}

/// Handles `stats`: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = share(open_storage(Path::new(&config.storage.database_path))?);
    let stats = {
        let guard = lock(&storage)?;
        load_statistics(&*guard, config)?
    };
    print_statistics(&stats);
    Ok(())
}

/// Handles `check`: validates config and shows what would be crawled
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Lemmascope Configuration Check ===\n");

    println!("Crawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Split threshold: {}", config.crawler.split_threshold);
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nRequest headers:");
    println!("  User-Agent: {}", config.user_agent.user_agent_or_default());
    println!("  Referrer: {}", config.user_agent.referrer_or_default());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nSearch:");
    println!("  Frequency threshold: {}", config.search.frequency_threshold);
    println!("  Default limit: {}", config.search.default_limit);
    println!("  Language: {:?}", config.analyzer.language);

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({})", site.name, site.url);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}
