//! Viager listing watcher CLI
//!
//! Local execution entry point.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use viager_watch::{
    config::load_config,
    error::{AppError, Result},
    models::ListingId,
    pipeline,
    storage::{IdentifierLedger, PendingQueue, RecordSink, StoragePaths},
    utils::{create_async_client, hash_file},
};

/// viager-watch - New listing detector
#[derive(Parser, Debug)]
#[command(
    name = "viager-watch",
    version,
    about = "Detects and fetches newly published viager listings"
)]
struct Cli {
    /// Path to storage directory holding config.toml and all state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run full pipeline: Sync → Fetch
    Run {
        /// Wipe all persisted state first
        #[arg(long)]
        full_reset: bool,
    },

    /// Sync the sitemap and queue new listings without fetching
    Sync,

    /// Fetch queued listings
    Fetch,

    /// Queue listing identifiers for another fetch
    Requeue {
        /// Listing identifiers
        #[arg(required = true)]
        ids: Vec<ListingId>,
    },

    /// Delete snapshot, ledger, queue, records and stats
    Reset {
        /// Confirm the irreversible wipe
        #[arg(long)]
        yes: bool,
    },

    /// Validate configuration
    Validate,

    /// Show current state info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(&cli.storage_dir)?;
    let paths = StoragePaths::resolve(&cli.storage_dir, &config.paths);
    log::debug!("Storage directory: {}", paths.root.display());

    match cli.command {
        Command::Run { full_reset } => {
            config.full_reset |= full_reset;
            let client = create_async_client(&config.crawler)?;
            let stats = pipeline::run_pipeline(&config, &paths, client).await?;

            log::info!(
                "Run complete: {} added URLs, {} new listings, {}/{} fetched",
                stats.added_urls,
                stats.new_ids,
                stats.fetch.succeeded,
                stats.fetch.requested
            );
        }

        Command::Sync => {
            let client = create_async_client(&config.crawler)?;
            let sync = pipeline::run_sync(&config, &paths, client).await?;

            if sync.change.changed {
                log::info!(
                    "Sitemap changed: {} added URLs, {} new listings queued",
                    sync.change.added_count(),
                    sync.new_ids.len()
                );
            } else {
                log::info!("Sitemap unchanged");
            }
        }

        Command::Fetch => {
            let client = create_async_client(&config.crawler)?;
            let report = pipeline::run_fetch(&config, &paths, client).await?;
            log::info!(
                "Fetched {}/{} listings",
                report.succeeded,
                report.requested
            );
        }

        Command::Requeue { ids } => {
            let ids: BTreeSet<ListingId> = ids.into_iter().collect();
            let added = pipeline::run_requeue(&paths, &ids).await?;
            log::info!("Queued {} of {} identifiers", added, ids.len());
        }

        Command::Reset { yes } => {
            if !yes {
                log::error!("Reset deletes all state. Pass --yes to confirm.");
                return Err(AppError::validation("reset not confirmed"));
            }
            let removed = pipeline::run_reset(&paths).await?;
            log::info!("Removed {} files", removed);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            IdentifierLedger::new(&paths.ledger, &config.source.listing_marker)?;
            create_async_client(&config.crawler)?;
            log::info!("✓ Config OK");
        }

        Command::Info => {
            log::info!("Storage directory: {}", paths.root.display());

            if paths.snapshot.exists() {
                log::info!("Sitemap snapshot: {}", hash_file(&paths.snapshot).await?);
            } else {
                log::info!("Sitemap snapshot: not found");
            }

            let ledger = IdentifierLedger::new(&paths.ledger, &config.source.listing_marker)?;
            log::info!("Known listings: {}", ledger.len().await?);
            log::info!(
                "Pending listings: {}",
                PendingQueue::new(&paths.pending).load().await?.len()
            );
            log::info!("Stored records: {}", RecordSink::count(&paths.records).await?);

            match pipeline::load_stats(&paths).await? {
                Some(stats) => {
                    log::info!("Last run: {}", stats.end_time);
                    log::info!(
                        "  {} added URLs, {} new listings, {} fetched, {} failed",
                        stats.added_urls,
                        stats.new_ids,
                        stats.fetch.succeeded,
                        stats.fetch.failure_count()
                    );
                }
                None => log::info!("No completed run yet."),
            }
        }
    }

    Ok(())
}
