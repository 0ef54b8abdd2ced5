//! Full reset of persisted state.

use std::path::PathBuf;

use crate::error::Result;
use crate::storage::StoragePaths;
use crate::storage::local::{remove_if_exists, temp_path};

/// Removes the snapshot, ledger, pending queue and record sink so the next
/// sync treats every sitemap entry as new. Irreversible.
#[derive(Debug, Clone)]
pub struct ResetController {
    targets: Vec<PathBuf>,
}

impl ResetController {
    pub fn new(paths: &StoragePaths) -> Self {
        let targets = vec![
            temp_path(&paths.snapshot),
            paths.snapshot.clone(),
            paths.ledger.clone(),
            paths.pending.clone(),
            paths.records.clone(),
            paths.stats.clone(),
        ];
        Self { targets }
    }

    /// Delete all state files. Returns the files that existed.
    pub async fn full_reset(&self) -> Result<Vec<PathBuf>> {
        log::warn!("Full reset: wiping snapshot, ledger and records");
        let mut removed = Vec::new();
        for path in &self.targets {
            if remove_if_exists(path).await? {
                log::info!("Removed {}", path.display());
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }
}
