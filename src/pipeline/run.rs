// src/pipeline/run.rs

//! Sync and fetch entry points.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, FetchReport, ListingId, RunStats, SitemapChange};
use crate::services::{ListingFetcher, SitemapSynchronizer, StagedSitemap};
use crate::storage::local::{read_optional, write_atomic};
use crate::storage::{IdentifierLedger, PendingQueue, RecordSink, ResetController, StoragePaths};
use crate::utils::HttpTransport;

/// What a sync step discovered.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub change: SitemapChange,
    /// Identifiers queued for fetching by this sync
    pub new_ids: BTreeSet<ListingId>,
}

/// Run the full pipeline: optional reset, sync, then fetch.
pub async fn run_pipeline<T>(config: &Config, paths: &StoragePaths, transport: T) -> Result<RunStats>
where
    T: HttpTransport + Clone,
{
    let start_time = Utc::now();

    if config.full_reset {
        ResetController::new(paths).full_reset().await?;
    }

    log::info!("Step 1/2: Synchronizing sitemap...");
    let sync = run_sync(config, paths, transport.clone()).await?;

    log::info!("Step 2/2: Fetching pending listings...");
    let fetch = run_fetch(config, paths, transport).await?;

    let stats = RunStats {
        start_time,
        end_time: Utc::now(),
        full_reset: config.full_reset,
        sitemap_changed: sync.change.changed,
        added_urls: sync.change.added_count(),
        new_ids: sync.new_ids.len(),
        fetch,
    };
    write_stats(paths, &stats).await?;

    Ok(stats)
}

/// Sync the sitemap and queue identifiers of newly added listings.
///
/// New identifiers are queued before the snapshot is promoted, so a crash
/// in between only causes the same additions to be found again. If the
/// promotion fails the queue is put back as it was.
pub async fn run_sync<T: HttpTransport>(
    config: &Config,
    paths: &StoragePaths,
    transport: T,
) -> Result<SyncOutcome> {
    let synchronizer = SitemapSynchronizer::from_config(transport, config, paths);
    let ledger = IdentifierLedger::new(&paths.ledger, &config.source.listing_marker)?;
    let pending = PendingQueue::new(&paths.pending);

    let staged = synchronizer.stage().await?;
    queue_and_promote(staged, &ledger, &pending).await
}

/// Queue the staged additions, then promote the staged snapshot.
async fn queue_and_promote(
    staged: StagedSitemap,
    ledger: &IdentifierLedger,
    pending: &PendingQueue,
) -> Result<SyncOutcome> {
    if !staged.change().changed {
        let change = staged.promote().await?;
        return Ok(SyncOutcome {
            change,
            new_ids: BTreeSet::new(),
        });
    }

    let queued = async {
        let previous = pending.load().await?;
        let new_ids = ledger
            .extract_new(staged.change().added_urls.iter().map(String::as_str))
            .await?;
        pending.enqueue(&new_ids).await?;
        Ok::<_, AppError>((previous, new_ids))
    }
    .await;

    let (previous, new_ids) = match queued {
        Ok(queued) => queued,
        Err(e) => {
            if let Err(cleanup) = staged.discard().await {
                log::warn!("Could not discard staged sitemap: {}", cleanup);
            }
            return Err(e);
        }
    };

    match staged.promote().await {
        Ok(change) => {
            log::info!(
                "{} added URLs, {} new listings",
                change.added_count(),
                new_ids.len()
            );
            Ok(SyncOutcome { change, new_ids })
        }
        Err(e) => {
            if let Err(restore) = pending.replace(&previous).await {
                log::error!("Could not restore pending queue: {}", restore);
            }
            Err(e)
        }
    }
}

/// Fetch every pending listing, then record the batch in the ledger.
pub async fn run_fetch<T: HttpTransport>(
    config: &Config,
    paths: &StoragePaths,
    transport: T,
) -> Result<FetchReport> {
    let ledger = IdentifierLedger::new(&paths.ledger, &config.source.listing_marker)?;
    let pending = PendingQueue::new(&paths.pending);

    let ids = pending.load().await?;
    if ids.is_empty() {
        log::info!("No pending listings");
        return Ok(FetchReport::default());
    }

    let sink = Arc::new(RecordSink::open(&paths.records).await?);
    let fetcher = ListingFetcher::new(transport, sink, config);
    let report = fetcher.fetch_all(&ids, config.crawler.max_concurrent).await?;

    let merged = ledger.merge(&ids).await?;
    pending.clear().await?;
    log::info!(
        "Ledger now holds {} identifiers ({} added)",
        merged.total,
        merged.added
    );

    if !report.failed.is_empty() {
        let failed: Vec<String> = report.failed.iter().map(ListingId::to_string).collect();
        log::warn!(
            "{} listings were not stored; re-queue them with: requeue {}",
            failed.len(),
            failed.join(" ")
        );
    }
    Ok(report)
}

/// Put identifiers back on the pending queue, seen or not.
pub async fn run_requeue(paths: &StoragePaths, ids: &BTreeSet<ListingId>) -> Result<usize> {
    PendingQueue::new(&paths.pending).enqueue(ids).await
}

/// Wipe every persisted file.
pub async fn run_reset(paths: &StoragePaths) -> Result<usize> {
    Ok(ResetController::new(paths).full_reset().await?.len())
}

async fn write_stats(paths: &StoragePaths, stats: &RunStats) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(stats)?;
    write_atomic(&paths.stats, &bytes).await
}

/// Statistics of the last completed run, if any.
pub async fn load_stats(paths: &StoragePaths) -> Result<Option<RunStats>> {
    match read_optional(&paths.stats).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}
