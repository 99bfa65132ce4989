//! sitewatch CLI
//!
//! Manage tracked pages and run the polling loop locally.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sitewatch::{
    error::{AppError, Result},
    models::{ChangeEvent, Config, SegmentKind},
    pipeline::CheckOutcome,
    services::{HttpFetcher, SiteTracker},
    storage::{KeyValueStore, LocalStorage, TrackedSiteStore},
    utils::url::{display_name, format_url},
};

/// sitewatch - Web Page Change Tracker
#[derive(Parser, Debug)]
#[command(name = "sitewatch", version, about = "Tracks web pages for content changes")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Override the storage directory from the configuration
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start tracking a page
    Add {
        url: String,
        /// Polling interval in seconds (default from configuration)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Stop tracking a page
    Remove { url: String },

    /// Change the polling interval of a tracked page
    Interval { url: String, seconds: u64 },

    /// List tracked pages
    List,

    /// Check one page (or every page) once and print changes
    Check { url: Option<String> },

    /// Poll all tracked pages until interrupted
    Watch,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_event(event: &ChangeEvent) {
    println!(
        "[{}] {} changed",
        event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
        display_name(&event.url)
    );
    for segment in event
        .diff
        .iter()
        .filter(|s| s.kind != SegmentKind::Unchanged)
    {
        println!("    {}", segment.format());
    }
}

fn print_outcome(url: &str, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Baseline => println!("{url}: baseline captured"),
        CheckOutcome::Unchanged => println!("{url}: no change"),
        CheckOutcome::Changed(event) => print_event(event),
        CheckOutcome::Failed {
            error,
            consecutive_failures,
        } => println!("{url}: failed ({error}, {consecutive_failures} in a row)"),
        CheckOutcome::Discarded => println!("{url}: removed during check"),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config);
    init_logging(cli.verbose, &config.logging.level);

    if let Some(dir) = cli.storage_dir {
        config.storage.root_dir = dir;
    }

    let backend: Arc<dyn KeyValueStore> = Arc::new(LocalStorage::new(&config.storage.root_dir));
    let store = Arc::new(TrackedSiteStore::open(backend, config.storage.key.clone()).await?);

    match cli.command {
        Command::Add { url, interval } => {
            let url = format_url(&url)?;
            let interval = config
                .tracker
                .clamp_interval(interval.unwrap_or(config.tracker.default_interval_secs));
            store.add(&url, interval).await?;
            println!("Tracking {url} every {interval}s");
        }

        Command::Remove { url } => {
            let url = format_url(&url)?;
            store.remove(&url).await?;
            println!("Stopped tracking {url}");
        }

        Command::Interval { url, seconds } => {
            let url = format_url(&url)?;
            let seconds = config.tracker.clamp_interval(seconds);
            store.set_interval(&url, seconds).await?;
            println!("Polling {url} every {seconds}s");
        }

        Command::List => {
            let sites = store.summaries().await;
            if sites.is_empty() {
                println!("No tracked pages.");
            }
            for site in sites {
                let checked = site
                    .last_checked_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  every {}s  last checked {}  failures {}",
                    site.url, site.poll_interval_secs, checked, site.consecutive_failures
                );
            }
        }

        Command::Check { url } => {
            let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
            let tracker = SiteTracker::new(&config, Arc::clone(&store), fetcher);

            match url {
                Some(url) => {
                    let report = tracker.check_now(&format_url(&url)?).await?;
                    print_outcome(&report.url, &report.outcome);
                }
                None => {
                    for (url, result) in tracker.check_all().await {
                        match result {
                            Ok(report) => print_outcome(&url, &report.outcome),
                            Err(e) => log::error!("{}: {}", url, e),
                        }
                    }
                }
            }
        }

        Command::Watch => {
            let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
            let tracker = SiteTracker::new(&config, Arc::clone(&store), fetcher);
            tracker.on_change(|event| print_event(&event));

            if tracker.start().await == 0 {
                log::warn!("No tracked pages. Use 'sitewatch add <url>' first.");
                return Ok(());
            }

            tokio::signal::ctrl_c().await?;
            log::info!("Interrupted, shutting down...");
            tracker.shutdown().await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if !cli.config.exists() {
                return Err(AppError::config(format!(
                    "{} not found (defaults are valid)",
                    cli.config.display()
                )));
            }
            log::info!("Config OK");
        }
    }

    Ok(())
}
