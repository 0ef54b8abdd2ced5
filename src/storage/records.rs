//! Append-only store of fetched listing records.
//!
//! One JSON document per line. Concurrent writers are serialized by a mutex
//! owned by the sink, held for exactly one append, so lines never
//! interleave. The file may hold the same listing more than once across
//! runs; consumers deduplicate.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::ListingRecord;
use crate::storage::local::{ensure_parent, read_optional};

pub struct RecordSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl RecordSink {
    /// Open the sink for appending, creating the file if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_parent(&path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub async fn append(&self, record: &ListingRecord) -> Result<()> {
        let mut line = record.to_line()?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        log::trace!("Appended listing {}", record.id());
        Ok(())
    }

    /// Read every record currently in the file at `path`.
    pub async fn read_all(path: &Path) -> Result<Vec<Value>> {
        let Some(bytes) = read_optional(path).await? else {
            return Ok(Vec::new());
        };
        let text = String::from_utf8(bytes)
            .map_err(|e| AppError::validation(format!("{}: {e}", path.display())))?;

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AppError::from))
            .collect()
    }

    /// Number of records in the file at `path`.
    pub async fn count(path: &Path) -> Result<usize> {
        let Some(bytes) = read_optional(path).await? else {
            return Ok(0);
        };
        Ok(bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingId;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(id: u64) -> ListingRecord {
        let raw = json!({
            "results": {
                "annonces": [{ "dossier_id": id, "description": "x".repeat(8192) }],
                "total": 1
            }
        });
        ListingRecord::from_response(ListingId(id), raw).unwrap()
    }

    #[tokio::test]
    async fn test_append_writes_one_line_per_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records/listings.jsonl");
        let sink = RecordSink::open(&path).await.unwrap();

        sink.append(&record(1)).await.unwrap();
        sink.append(&record(2)).await.unwrap();

        assert_eq!(RecordSink::count(&path).await.unwrap(), 2);
        let records = RecordSink::read_all(&path).await.unwrap();
        assert_eq!(records[0]["results"]["annonces"][0]["dossier_id"], 1);
        assert_eq!(records[1]["results"]["annonces"][0]["dossier_id"], 2);
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("listings.jsonl");

        RecordSink::open(&path).await.unwrap().append(&record(1)).await.unwrap();
        RecordSink::open(&path).await.unwrap().append(&record(1)).await.unwrap();

        assert_eq!(RecordSink::count(&path).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_never_interleave() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("listings.jsonl");
        let sink = Arc::new(RecordSink::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for id in 0..64u64 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move { sink.append(&record(id)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = RecordSink::read_all(&path).await.unwrap();
        assert_eq!(records.len(), 64);
        let mut seen: Vec<u64> = records
            .iter()
            .map(|r| r["results"]["annonces"][0]["dossier_id"].as_u64().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("none.jsonl");
        assert_eq!(RecordSink::count(&path).await.unwrap(), 0);
        assert!(RecordSink::read_all(&path).await.unwrap().is_empty());
    }
}
