//! Bus-Crawler main entry point
//!
//! This is the command-line interface for the Bus-Crawler listing pipeline.

use anyhow::Context;
use bus_crawler::config::{load_config_with_hash, Config};
use bus_crawler::crawler::initialize_and_run;
use bus_crawler::output::{load_statistics, print_crawl_report, print_statistics, report_line};
use bus_crawler::storage::open_storage;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Bus-Crawler: regional bus listing crawler
///
/// Bus-Crawler walks each configured region's landing page, discovers the
/// routes it advertises, extracts every departure listed on each route page
/// and appends the normalized listings to a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "bus-crawler")]
#[command(version)]
#[command(about = "Crawls regional bus listings into SQLite", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the number of parallel fetch sessions
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=16))]
    workers: Option<u32>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show listing statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.quiet).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bus_crawler=info,warn"),
            1 => EnvFilter::new("bus_crawler=debug,info"),
            2 => EnvFilter::new("bus_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Bus-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Page load timeout: {}ms", config.crawler.page_load_timeout_ms);
    println!("  Reveal timeout: {}ms", config.crawler.reveal_timeout_ms);
    println!(
        "  Settle: {}ms (bounded at {}ms, polling every {}ms)",
        config.crawler.settle_ms, config.crawler.settle_timeout_ms, config.crawler.poll_interval_ms
    );
    println!(
        "  Flush retries: from {}ms for up to {}ms",
        config.crawler.flush_initial_backoff_ms, config.crawler.flush_max_elapsed_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFetcher:");
    println!("  Engine: {:?}", config.fetcher.engine);
    println!("  Headless: {}", config.fetcher.headless);
    if let Some(path) = &config.fetcher.chrome_path {
        println!("  Chrome: {}", path);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSelectors:");
    for (name, selector) in config.selectors.entries() {
        println!("  {:<14} {}", name, selector);
    }

    println!("\nRegions ({}):", config.regions.len());
    for region in &config.regions {
        println!("  - {} ({})", region.name, region.entry_url);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} regions with {} workers",
        config.regions.len(),
        config.crawler.workers
    );
}

/// Handles the --stats mode: shows listing statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage).context("Failed to load statistics")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main crawl operation
///
/// Ctrl-C raises the run's cancellation signal: no new pages are started and
/// whatever was already collected is still written.
async fn handle_crawl(config: Config, config_hash: &str, quiet: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Regions: {}, workers: {}, engine: {:?}",
        config.regions.len(),
        config.crawler.workers,
        config.fetcher.engine
    );

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages and flushing");
            signal.cancel();
        }
    });

    let report = initialize_and_run(config, config_hash, cancel)
        .await
        .context("Crawl failed")?;

    tracing::info!("{}", report_line(&report));
    if !quiet {
        print_crawl_report(&report);
    }

    Ok(())
}
