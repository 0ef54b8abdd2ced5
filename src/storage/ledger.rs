//! Persisted set of listing identifiers already known to the watcher.
//!
//! The ledger is a line-delimited text file. It only grows, except on a
//! full reset, and is the single source of truth for "already seen".

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::Result;
use crate::models::ListingId;
use crate::storage::local::{append_id_lines, read_id_lines, write_id_lines};

/// Result of merging identifiers into the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Identifiers that were not in the ledger before the merge
    pub added: usize,
    /// Ledger size after the merge
    pub total: usize,
    /// Duplicate or unreadable lines removed by the rewrite
    pub repaired: usize,
}

/// Deduplicated, persisted identifier set.
#[derive(Debug, Clone)]
pub struct IdentifierLedger {
    path: PathBuf,
    pattern: Regex,
}

impl IdentifierLedger {
    /// Create a ledger stored at `path`, recognizing listing URLs by `marker`.
    pub fn new(path: impl Into<PathBuf>, marker: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"{}(\d+)(?:[/?#]|$)", regex::escape(marker)))?;
        Ok(Self {
            path: path.into(),
            pattern,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract listing identifiers from URLs.
    ///
    /// The identifier is the integer following the marker, up to the next
    /// path segment. URLs without the marker, or with a non-numeric
    /// segment after it, are skipped.
    pub fn extract_identifiers<'a, I>(&self, urls: I) -> BTreeSet<ListingId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        urls.into_iter()
            .filter_map(|url| {
                let caps = self.pattern.captures(url)?;
                match caps[1].parse::<ListingId>() {
                    Ok(id) => Some(id),
                    Err(e) => {
                        log::debug!("Skipping {}: {}", url, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Identifiers from `urls` that the ledger has not seen yet.
    pub async fn extract_new<'a, I>(&self, urls: I) -> Result<BTreeSet<ListingId>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let extracted = self.extract_identifiers(urls);
        let known = self.all().await?;
        Ok(extracted.difference(&known).copied().collect())
    }

    /// Current ledger contents.
    pub async fn all(&self) -> Result<BTreeSet<ListingId>> {
        let lines = read_id_lines(&self.path).await?;
        if lines.needs_repair() {
            log::warn!(
                "Ledger {} holds {} duplicate and {} unreadable lines; next merge rewrites it",
                self.path.display(),
                lines.duplicates,
                lines.invalid
            );
        }
        Ok(lines.ids.into_iter().collect())
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(read_id_lines(&self.path).await?.ids.len())
    }

    /// Append identifiers, then rewrite the file without duplicates.
    ///
    /// Merging the same identifiers any number of times leaves each one in
    /// the file exactly once.
    pub async fn merge(&self, ids: &BTreeSet<ListingId>) -> Result<MergeOutcome> {
        let before = read_id_lines(&self.path).await?;
        let known: BTreeSet<ListingId> = before.ids.iter().copied().collect();
        let added = ids.difference(&known).count();

        let batch: Vec<ListingId> = ids.iter().copied().collect();
        append_id_lines(&self.path, &batch).await?;
        let repaired = self.keep_unique().await?;

        let outcome = MergeOutcome {
            added,
            total: known.len() + added,
            repaired: repaired.saturating_sub(batch.len() - added),
        };
        log::info!(
            "Ledger: {} new identifiers, {} total",
            outcome.added,
            outcome.total
        );
        Ok(outcome)
    }

    /// Rewrite the ledger keeping the first occurrence of each identifier.
    /// Returns the number of lines removed.
    async fn keep_unique(&self) -> Result<usize> {
        let lines = read_id_lines(&self.path).await?;
        let removed = lines.duplicates + lines.invalid;
        if lines.needs_repair() {
            write_id_lines(&self.path, &lines.ids).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger(tmp: &TempDir) -> IdentifierLedger {
        IdentifierLedger::new(tmp.path().join("ledger/known_ids.txt"), "pieces-").unwrap()
    }

    fn ids(values: &[u64]) -> BTreeSet<ListingId> {
        values.iter().copied().map(ListingId).collect()
    }

    #[test]
    fn test_extract_identifiers() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        let urls = [
            "https://www.example.com/viager/maison-paris-4-pieces-123",
            "https://www.example.com/viager/appartement-lyon-2-pieces-456/photos",
            "https://www.example.com/viager/studio-pieces-789?ref=map",
            "https://www.example.com/contact",
            "https://www.example.com/viager/pieces-abc",
        ];

        let found = ledger.extract_identifiers(urls.iter().copied());
        assert_eq!(found, ids(&[123, 456, 789]));
    }

    #[test]
    fn test_extract_uses_configured_marker() {
        let tmp = TempDir::new().unwrap();
        let ledger = IdentifierLedger::new(tmp.path().join("ids.txt"), "lot.").unwrap();
        let found = ledger.extract_identifiers(["https://x.test/lot.77", "https://x.test/lotX77"]);
        assert_eq!(found, ids(&[77]));
    }

    #[tokio::test]
    async fn test_empty_ledger() {
        let tmp = TempDir::new().unwrap();
        assert!(ledger(&tmp).all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_merges_keep_each_id_once() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);

        let first = ledger.merge(&ids(&[1, 2, 3])).await.unwrap();
        assert_eq!(first.added, 3);
        let second = ledger.merge(&ids(&[2, 3, 4])).await.unwrap();
        assert_eq!(second.added, 1);
        assert_eq!(second.total, 4);
        ledger.merge(&ids(&[1, 2, 3, 4])).await.unwrap();

        assert_eq!(ledger.all().await.unwrap(), ids(&[1, 2, 3, 4]));
        let content = tokio::fs::read_to_string(ledger.path()).await.unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_merge_repairs_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        tokio::fs::create_dir_all(ledger.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(ledger.path(), "9\n9\ngarbage\n8\n").await.unwrap();

        let outcome = ledger.merge(&ids(&[10])).await.unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.repaired, 2);

        let content = tokio::fs::read_to_string(ledger.path()).await.unwrap();
        assert_eq!(content, "9\n8\n10\n");
    }

    #[tokio::test]
    async fn test_extract_new_skips_known() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        ledger.merge(&ids(&[1])).await.unwrap();

        let fresh = ledger
            .extract_new(["https://x.test/a-pieces-1", "https://x.test/b-pieces-2"])
            .await
            .unwrap();
        assert_eq!(fresh, ids(&[2]));
    }
}
