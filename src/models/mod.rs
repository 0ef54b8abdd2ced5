// src/models/mod.rs

//! Domain models for the listing watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod query;

// Re-export all public types
pub use config::{Config, CrawlerConfig, ENV_FULL_RESET, ENV_PROXY, PathsConfig, SourceConfig};
pub use listing::{ListingId, ListingRecord, SitemapChange};
pub use query::ListingQuery;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one fetch batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    /// Identifiers submitted to the batch
    pub requested: usize,
    /// Records appended to the sink
    pub succeeded: usize,
    /// Identifiers whose fetch failed and were skipped
    pub failed: Vec<ListingId>,
}

impl FetchReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Statistics for a pipeline run, persisted for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub full_reset: bool,
    pub sitemap_changed: bool,
    pub added_urls: usize,
    pub new_ids: usize,
    pub fetch: FetchReport,
}
