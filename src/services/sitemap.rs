// src/services/sitemap.rs

//! Sitemap download, change detection and snapshot promotion.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{AppError, Result};
use crate::models::{Config, SitemapChange};
use crate::storage::StoragePaths;
use crate::storage::local::{read_optional, remove_if_exists, temp_path, write_file};
use crate::utils::{HttpTransport, hash_file};

/// Parse a `<urlset>` sitemap and return every `<url><loc>` value.
///
/// Any XML error, an unclosed element, or a root other than `urlset` is a
/// [`AppError::MalformedDocument`]; a broken file is never read as empty.
pub fn parse_urlset(bytes: &[u8], source: &Path) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    let mut collecting = false;
    let mut current = String::new();
    let mut urls = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            AppError::malformed(source, format!("at byte {}: {e}", reader.error_position()))
        })?;

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if stack.is_empty() {
                    check_root(&name, saw_root, source)?;
                    saw_root = true;
                }
                collecting = stack.len() == 2 && stack[1] == b"url" && name == b"loc";
                if collecting {
                    current.clear();
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if stack.is_empty() {
                    check_root(e.local_name().as_ref(), saw_root, source)?;
                    saw_root = true;
                }
            }
            Event::End(_) => {
                stack.pop();
                if collecting {
                    collecting = false;
                    let loc = current.trim();
                    if !loc.is_empty() {
                        urls.push(loc.to_string());
                    }
                }
            }
            Event::Text(text) => {
                if stack.is_empty() {
                    return Err(AppError::malformed(source, "text outside the root element"));
                }
                if collecting {
                    let text = text
                        .unescape()
                        .map_err(|e| AppError::malformed(source, e))?;
                    current.push_str(&text);
                }
            }
            Event::CData(data) => {
                if collecting {
                    current.push_str(&String::from_utf8_lossy(&data));
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(AppError::malformed(
            source,
            format!(
                "document ends inside <{}>",
                String::from_utf8_lossy(open)
            ),
        ));
    }
    if !saw_root {
        return Err(AppError::malformed(source, "no <urlset> root element"));
    }
    Ok(urls)
}

fn check_root(name: &[u8], saw_root: bool, source: &Path) -> Result<()> {
    if saw_root {
        return Err(AppError::malformed(source, "more than one root element"));
    }
    if name != b"urlset" {
        return Err(AppError::malformed(
            source,
            format!(
                "expected <urlset> root, found <{}>",
                String::from_utf8_lossy(name)
            ),
        ));
    }
    Ok(())
}

/// A downloaded sitemap that has been compared but not yet promoted.
///
/// Dropping it without calling [`StagedSitemap::promote`] leaves the saved
/// snapshot untouched.
#[derive(Debug)]
pub struct StagedSitemap {
    change: SitemapChange,
    download: Option<PathBuf>,
    snapshot: PathBuf,
}

impl StagedSitemap {
    pub fn change(&self) -> &SitemapChange {
        &self.change
    }

    /// Atomically replace the snapshot with the download.
    pub async fn promote(self) -> Result<SitemapChange> {
        if let Some(download) = &self.download {
            tokio::fs::rename(download, &self.snapshot)
                .await
                .map_err(|e| AppError::persistence_race(&self.snapshot, e))?;
            log::info!(
                "Snapshot {} updated ({} new URLs)",
                self.snapshot.display(),
                self.change.added_count()
            );
        }
        Ok(self.change)
    }

    /// Throw the download away, keeping the current snapshot.
    pub async fn discard(self) -> Result<()> {
        if let Some(download) = &self.download {
            remove_if_exists(download).await?;
        }
        Ok(())
    }
}

/// Keeps a local snapshot of the remote sitemap and reports added URLs.
pub struct SitemapSynchronizer<T> {
    transport: T,
    sitemap_url: String,
    snapshot: PathBuf,
    timeout: Duration,
}

impl<T: HttpTransport> SitemapSynchronizer<T> {
    pub fn new(
        transport: T,
        sitemap_url: impl Into<String>,
        snapshot: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            sitemap_url: sitemap_url.into(),
            snapshot: snapshot.into(),
            timeout,
        }
    }

    pub fn from_config(transport: T, config: &Config, paths: &StoragePaths) -> Self {
        Self::new(
            transport,
            config.source.sitemap_url.clone(),
            paths.snapshot.clone(),
            Duration::from_secs(config.crawler.sitemap_timeout_secs),
        )
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot
    }

    /// Download, compare and, on change, promote the new snapshot.
    pub async fn sync(&self) -> Result<SitemapChange> {
        self.stage().await?.promote().await
    }

    /// Download the sitemap and compute what changed, without promoting it.
    pub async fn stage(&self) -> Result<StagedSitemap> {
        let download = temp_path(&self.snapshot);

        log::info!("Downloading sitemap {}", self.sitemap_url);
        let bytes = self.transport.get(&self.sitemap_url, self.timeout).await?;
        write_file(&download, &bytes).await?;

        let has_snapshot = tokio::fs::try_exists(&self.snapshot).await?;
        if has_snapshot && hash_file(&self.snapshot).await? == hash_file(&download).await? {
            log::info!("Sitemap unchanged");
            remove_if_exists(&download).await?;
            return Ok(StagedSitemap {
                change: SitemapChange::unchanged(),
                download: None,
                snapshot: self.snapshot.clone(),
            });
        }

        let added_urls = match self.added_urls(has_snapshot, &bytes, &download).await {
            Ok(added) => added,
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&download).await {
                    log::warn!("Could not remove {}: {}", download.display(), cleanup);
                }
                return Err(e);
            }
        };

        log::info!("Sitemap changed: {} new URLs", added_urls.len());
        Ok(StagedSitemap {
            change: SitemapChange {
                changed: true,
                added_urls,
            },
            download: Some(download),
            snapshot: self.snapshot.clone(),
        })
    }

    /// URLs in the download that the current snapshot does not list.
    async fn added_urls(
        &self,
        has_snapshot: bool,
        fresh: &[u8],
        download: &Path,
    ) -> Result<BTreeSet<String>> {
        let previous: BTreeSet<String> = if has_snapshot {
            match read_optional(&self.snapshot).await? {
                Some(bytes) => parse_urlset(&bytes, &self.snapshot)?.into_iter().collect(),
                None => BTreeSet::new(),
            }
        } else {
            BTreeSet::new()
        };

        let current = parse_urlset(fresh, download)?;
        Ok(current
            .into_iter()
            .filter(|url| !previous.contains(url))
            .collect())
    }
}
