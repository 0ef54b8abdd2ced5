//! Work list of identifiers discovered but not yet fetched.
//!
//! Written before the sitemap snapshot is promoted and cleared only after
//! a fetch batch completes, so an interrupted run resumes from here.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::ListingId;
use crate::storage::local::{read_id_lines, remove_if_exists, write_id_lines};

#[derive(Debug, Clone)]
pub struct PendingQueue {
    path: PathBuf,
}

impl PendingQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifiers waiting to be fetched.
    pub async fn load(&self) -> Result<BTreeSet<ListingId>> {
        Ok(read_id_lines(&self.path).await?.ids.into_iter().collect())
    }

    /// Add identifiers to the queue. Returns how many were not queued yet.
    pub async fn enqueue(&self, ids: &BTreeSet<ListingId>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut queued = self.load().await?;
        let before = queued.len();
        queued.extend(ids.iter().copied());
        let added = queued.len() - before;

        if added > 0 {
            self.replace(&queued).await?;
            log::info!("Queued {} identifiers ({} pending)", added, queued.len());
        }
        Ok(added)
    }

    /// Overwrite the queue with exactly `ids`.
    pub async fn replace(&self, ids: &BTreeSet<ListingId>) -> Result<()> {
        if ids.is_empty() {
            return self.clear().await;
        }
        let ids: Vec<ListingId> = ids.iter().copied().collect();
        write_id_lines(&self.path, &ids).await
    }

    /// Empty the queue after a completed batch.
    pub async fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(values: &[u64]) -> BTreeSet<ListingId> {
        values.iter().copied().map(ListingId).collect()
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let queue = PendingQueue::new(tmp.path().join("pending.txt"));

        assert_eq!(queue.enqueue(&ids(&[4, 5])).await.unwrap(), 2);
        assert_eq!(queue.enqueue(&ids(&[5, 6])).await.unwrap(), 1);
        assert_eq!(queue.enqueue(&ids(&[4])).await.unwrap(), 0);
        assert_eq!(queue.load().await.unwrap(), ids(&[4, 5, 6]));
    }

    #[tokio::test]
    async fn test_clear_and_replace() {
        let tmp = TempDir::new().unwrap();
        let queue = PendingQueue::new(tmp.path().join("pending.txt"));
        queue.enqueue(&ids(&[1, 2])).await.unwrap();

        queue.replace(&ids(&[9])).await.unwrap();
        assert_eq!(queue.load().await.unwrap(), ids(&[9]));

        queue.clear().await.unwrap();
        assert!(queue.load().await.unwrap().is_empty());
        assert!(!queue.path().exists());
        queue.clear().await.unwrap();
    }
}
