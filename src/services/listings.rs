// src/services/listings.rs

//! Listing detail fetcher.
//!
//! Issues one detail query per identifier, bounded by a concurrency limit,
//! and appends every accepted response to the record sink.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Config, FetchReport, ListingId, ListingQuery, ListingRecord};
use crate::storage::RecordSink;
use crate::utils::HttpTransport;

/// Service for fetching listing details into a [`RecordSink`].
pub struct ListingFetcher<T> {
    transport: T,
    sink: Arc<RecordSink>,
    api_url: String,
    timeout: Duration,
    delay: Duration,
}

impl<T: HttpTransport> ListingFetcher<T> {
    /// Create a fetcher with the given configuration.
    pub fn new(transport: T, sink: Arc<RecordSink>, config: &Config) -> Self {
        Self {
            transport,
            sink,
            api_url: config.source.api_url.clone(),
            timeout: Duration::from_secs(config.crawler.timeout_secs),
            delay: Duration::from_millis(config.crawler.request_delay_ms),
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch every identifier, at most `concurrency` at a time.
    ///
    /// A failing request is logged and skipped. A local failure, such as the
    /// sink refusing a write, stops the batch and is returned.
    pub async fn fetch_all(
        &self,
        ids: &BTreeSet<ListingId>,
        concurrency: usize,
    ) -> Result<FetchReport> {
        let concurrency = concurrency.max(1);
        let mut report = FetchReport {
            requested: ids.len(),
            ..FetchReport::default()
        };

        log::info!(
            "Fetching {} listings ({} concurrent)",
            ids.len(),
            concurrency
        );

        let mut results = stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.fetch_one(id).await) })
            .buffer_unordered(concurrency);

        while let Some((id, result)) = results.next().await {
            match result {
                Ok(()) => {
                    report.succeeded += 1;
                    log::debug!("Stored listing {}", id);
                }
                Err(error) if error.is_transient() => {
                    log::warn!("Failed to fetch listing {}: {}", id, error);
                    report.failed.push(id);
                }
                Err(error) => {
                    log::error!("Could not store listing {}: {}", id, error);
                    return Err(error);
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        report.failed.sort_unstable();
        log::info!(
            "Fetched {}/{} listings ({} failed)",
            report.succeeded,
            report.requested,
            report.failure_count()
        );
        Ok(report)
    }

    /// Query, validate and store a single listing.
    async fn fetch_one(&self, id: ListingId) -> Result<()> {
        let context = format!("listing {id}");
        let body = ListingQuery::for_listing(id).to_value()?;

        let bytes = tokio::time::timeout(
            self.timeout,
            self.transport.post_json(&self.api_url, &body, self.timeout),
        )
        .await
        .map_err(|_| AppError::fetch(&context, format!("no response within {:?}", self.timeout)))??;

        let raw: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::fetch(&context, format!("malformed response: {e}")))?;
        let record = ListingRecord::from_response(id, raw)?;

        self.sink.append(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::fake::FakeTransport;
    use tempfile::TempDir;

    fn ids(values: &[u64]) -> BTreeSet<ListingId> {
        values.iter().copied().map(ListingId).collect()
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.source.api_url = "https://listings.test/api".to_string();
        config.crawler.request_delay_ms = 0;
        config
    }

    async fn fetcher(
        tmp: &TempDir,
        fake: &Arc<FakeTransport>,
    ) -> (ListingFetcher<Arc<FakeTransport>>, std::path::PathBuf) {
        let path = tmp.path().join("records/listings.jsonl");
        let sink = Arc::new(RecordSink::open(&path).await.unwrap());
        (
            ListingFetcher::new(Arc::clone(fake), sink, &fast_config()),
            path,
        )
    }

    #[tokio::test]
    async fn test_fetch_all_appends_one_record_per_id() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTransport::new();
        let (fetcher, path) = fetcher(&tmp, &fake).await;

        let report = fetcher.fetch_all(&ids(&[1, 2, 3, 4, 5]), 3).await.unwrap();

        assert_eq!(report.requested, 5);
        assert_eq!(report.succeeded, 5);
        assert!(report.failed.is_empty());
        assert_eq!(fake.post_count(), 5);
        assert_eq!(RecordSink::count(&path).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_partial_failures_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTransport::new();
        fake.fail(2);
        fake.garble(4);
        let (fetcher, path) = fetcher(&tmp, &fake).await;

        let report = fetcher.fetch_all(&ids(&[1, 2, 3, 4, 5, 6]), 4).await.unwrap();

        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failed, vec![ListingId(2), ListingId(4)]);

        let records = RecordSink::read_all(&path).await.unwrap();
        let mut stored: Vec<u64> = records
            .iter()
            .map(|r| r["results"]["annonces"][0]["dossier_id"].as_u64().unwrap())
            .collect();
        stored.sort_unstable();
        assert_eq!(stored, vec![1, 3, 5, 6]);
    }

    #[tokio::test]
    async fn test_all_failures_complete_batch() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTransport::new();
        fake.fail(1);
        fake.fail(2);
        let (fetcher, path) = fetcher(&tmp, &fake).await;

        let report = fetcher.fetch_all(&ids(&[1, 2]), 2).await.unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failure_count(), 2);
        assert_eq!(RecordSink::count(&path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stalled_request_times_out() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTransport::new();
        fake.stall(7);
        let (fetcher, path) = fetcher(&tmp, &fake).await;
        let fetcher = fetcher.with_timeout(Duration::from_millis(50));

        let report = fetcher.fetch_all(&ids(&[7, 8]), 2).await.unwrap();
        assert_eq!(report.failed, vec![ListingId(7)]);
        assert_eq!(report.succeeded, 1);
        assert_eq!(RecordSink::count(&path).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_progresses() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTransport::new();
        let (fetcher, _) = fetcher(&tmp, &fake).await;

        let report = fetcher.fetch_all(&ids(&[1]), 0).await.unwrap();
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTransport::new();
        let (fetcher, _) = fetcher(&tmp, &fake).await;

        let report = fetcher.fetch_all(&BTreeSet::new(), 4).await.unwrap();
        assert_eq!(report.requested, 0);
        assert_eq!(fake.post_count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_sink_write_failure_aborts_batch() {
        let fake = FakeTransport::new();
        let sink = Arc::new(RecordSink::open("/dev/full").await.unwrap());
        let fetcher = ListingFetcher::new(Arc::clone(&fake), sink, &fast_config());

        let err = fetcher.fetch_all(&ids(&[1, 2]), 1).await.unwrap_err();

        assert!(matches!(err, AppError::Io(_)));
        assert!(!err.is_transient());
    }
}
