//! On-disk state of the watcher.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml              # Watcher configuration
//! ├── stats.json               # Statistics of the last run
//! ├── sitemaps/
//! │   └── sitemap.xml          # Snapshot of the last downloaded sitemap
//! ├── ledger/
//! │   ├── known_ids.txt        # Every identifier already seen
//! │   └── pending_ids.txt      # Identifiers waiting to be fetched
//! └── records/
//!     └── listings.jsonl       # Append-only detail records
//! ```

pub mod ledger;
pub mod local;
pub mod pending;
pub mod records;
pub mod reset;

use std::path::{Path, PathBuf};

use crate::models::PathsConfig;

// Re-export for convenience
pub use ledger::{IdentifierLedger, MergeOutcome};
pub use pending::PendingQueue;
pub use records::RecordSink;
pub use reset::ResetController;

/// Absolute locations of every persisted file.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub root: PathBuf,
    pub snapshot: PathBuf,
    pub ledger: PathBuf,
    pub pending: PathBuf,
    pub records: PathBuf,
    pub stats: PathBuf,
}

impl StoragePaths {
    /// Resolve configured file names against the storage directory.
    pub fn resolve(root: impl AsRef<Path>, paths: &PathsConfig) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            snapshot: root.join(&paths.sitemap_file),
            ledger: root.join(&paths.ledger_file),
            pending: root.join(&paths.pending_file),
            records: root.join(&paths.records_file),
            stats: root.join(&paths.stats_file),
            root,
        }
    }
}
