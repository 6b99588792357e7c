//! rx-harvest main entry point
//!
//! This is the command-line interface for the rx-harvest catalog scraper.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rx_harvest::api::{ApiServer, AppState};
use rx_harvest::config::{load_config_with_hash, Config};
use rx_harvest::crawler::{run_job, JobOptions, JobOutcome};
use rx_harvest::output::{load_statistics, print_statistics};
use rx_harvest::storage::{open_shared_storage, open_storage, BlobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// rx-harvest: a resumable medicine catalog scraper
///
/// rx-harvest walks the paginated listings of medicine catalog sites, extracts a
/// structured record from every item page and stores it in SQLite. Interrupted
/// runs resume from their last checkpoint.
#[derive(Parser, Debug)]
#[command(name = "rx-harvest")]
#[command(version)]
#[command(about = "A resumable medicine catalog scraper", long_about = None)]
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

    /// Start the control API instead of running a job in the foreground
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    serve: bool,

    /// Site to scrape (default: the first configured site)
    #[arg(long, value_name = "NAME")]
    site: Option<String>,

    /// Override the listing page cap
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// Resume an interrupted scrape (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start from page 1, ignoring the stored checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.site.as_deref(), cli.max_pages)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.serve {
        handle_serve(config, &config_hash).await
    } else {
        let options = JobOptions {
            resume: !cli.fresh,
            max_pages: cli.max_pages,
        };
        handle_scrape(config, &config_hash, cli.site.as_deref(), options).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rx_harvest=info,warn"),
            1 => EnvFilter::new("rx_harvest=debug,tower_http=debug,info"),
            2 => EnvFilter::new("rx_harvest=trace,debug"),
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

fn resolve_site<'a>(config: &'a Config, site: Option<&str>) -> Result<&'a str> {
    let found = match site {
        Some(name) => config.site(name),
        None => config.default_site(),
    };
    match found {
        Some(site) => Ok(&site.name),
        None => bail!("Unknown site: {}", site.unwrap_or("<none configured>")),
    }
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config, site: Option<&str>, max_pages: Option<u32>) -> Result<()> {
    use rx_harvest::sites::build_profile;

    println!("=== rx-harvest Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Max pages: {}", config.scraper.max_pages);
    println!(
        "  Delay between requests: {}-{}ms",
        config.scraper.min_delay_ms, config.scraper.max_delay_ms
    );
    println!("  Request timeout: {}s", config.scraper.request_timeout_secs);
    println!(
        "  Retry: {} attempts, {}ms base delay, {}ms jitter",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.jitter_ms
    );
    println!("  User agents: {}", config.user_agent.agents.len());

    if let Some(browser) = &config.browser {
        println!("\nBrowser:");
        println!("  WebDriver: {}", browser.webdriver_url);
        println!("  Headless: {}", browser.headless);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!(
        "  HTML: {} ({})",
        config.output.html_dir,
        if config.output.save_html { "saved" } else { "not saved" }
    );
    println!(
        "  Images: {} ({})",
        config.output.image_dir,
        if config.output.download_images {
            "downloaded"
        } else {
            "not downloaded"
        }
    );

    println!("\nSites ({}):", config.sites.len());
    for entry in &config.sites {
        let profile = build_profile(entry.kind, &entry.base_url)?;
        let cap = max_pages
            .or(entry.max_pages)
            .unwrap_or(config.scraper.max_pages);
        println!(
            "  - {} ({}, {:?} fetch, up to {} pages)",
            entry.name, entry.kind, entry.fetch_mode, cap
        );
        println!("    * first listing: {}", profile.listing_url(1));
    }

    let target = resolve_site(config, site)?;
    println!("\n✓ Configuration is valid");
    println!("✓ Would scrape site '{}'", target);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let blobs = BlobStore::new(&config.output.html_dir, &config.output.image_dir);
    let stats = load_statistics(&storage, Some(&blobs))?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the --serve mode: runs the control API until Ctrl-C
async fn handle_serve(config: Config, config_hash: &str) -> Result<()> {
    let config = Arc::new(config);
    let storage = open_shared_storage(Path::new(&config.output.database_path))?;
    let state = AppState::new(config.clone(), storage, config_hash);

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    ApiServer::new(config.api.clone(), state)
        .run(shutdown)
        .await
}

/// Handles the main scrape operation in the foreground
async fn handle_scrape(
    config: Config,
    config_hash: &str,
    site: Option<&str>,
    options: JobOptions,
) -> Result<()> {
    let site_name = resolve_site(&config, site)?.to_string();
    if options.resume {
        tracing::info!("Scraping {} (will resume an interrupted run)", site_name);
    } else {
        tracing::info!("Scraping {} from page 1 (ignoring stored progress)", site_name);
    }

    let config = Arc::new(config);
    let storage = open_shared_storage(Path::new(&config.output.database_path))?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match run_job(config, &site_name, storage, config_hash, options, cancel).await {
        Ok(JobOutcome::Completed {
            processed_items,
            pages,
        }) => {
            tracing::info!(
                "Scrape completed: {} items over {} listing pages",
                processed_items,
                pages
            );
            Ok(())
        }
        Ok(JobOutcome::Paused {
            cursor,
            processed_items,
        }) => {
            tracing::info!(
                "Scrape paused at page {} item {} after {} items; run again to resume",
                cursor.page,
                cursor.item_offset,
                processed_items
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}

/// Cancels `token` on the first Ctrl-C
fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping at the next item boundary");
                token.cancel();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
