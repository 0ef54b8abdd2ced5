//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Environment variable holding the outbound proxy endpoint.
pub const ENV_PROXY: &str = "PROXY_SERVER";

/// Environment variable requesting a full reset before the run.
pub const ENV_FULL_RESET: &str = "FULL_RESET";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and fetching behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Remote endpoints and listing URL shape
    #[serde(default)]
    pub source: SourceConfig,

    /// Persisted file locations, relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// Wipe all persisted state before the next run
    #[serde(default)]
    pub full_reset: bool,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or return default if the file does not exist.
    ///
    /// An unreadable or malformed file is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(&path) {
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "Config not found at {:?}. Using defaults.",
                    path.as_ref()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `PROXY_SERVER` / `FULL_RESET` overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(proxy) = lookup(ENV_PROXY) {
            let proxy = proxy.trim();
            if !proxy.is_empty() {
                self.crawler.proxy = Some(proxy.to_string());
            }
        }
        if let Some(flag) = lookup(ENV_FULL_RESET) {
            self.full_reset = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.sitemap_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.sitemap_timeout_secs must be > 0",
            ));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if let Some(proxy) = &self.crawler.proxy {
            Url::parse(proxy)
                .map_err(|e| AppError::validation(format!("crawler.proxy: {e}")))?;
        }
        Url::parse(&self.source.sitemap_url)
            .map_err(|e| AppError::validation(format!("source.sitemap_url: {e}")))?;
        Url::parse(&self.source.api_url)
            .map_err(|e| AppError::validation(format!("source.api_url: {e}")))?;
        if self.source.listing_marker.is_empty() {
            return Err(AppError::validation("source.listing_marker is empty"));
        }
        for (key, value) in [
            ("paths.sitemap_file", &self.paths.sitemap_file),
            ("paths.ledger_file", &self.paths.ledger_file),
            ("paths.pending_file", &self.paths.pending_file),
            ("paths.records_file", &self.paths.records_file),
            ("paths.stats_file", &self.paths.stats_file),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{key} is empty")));
            }
        }
        Ok(())
    }
}

/// HTTP client and fetching behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Deadline for a single listing detail request, in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Deadline for the sitemap download, in seconds
    #[serde(default = "defaults::sitemap_timeout")]
    pub sitemap_timeout_secs: u64,

    /// Delay after each completed detail request, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum number of detail requests in flight
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Optional proxy endpoint for all outbound requests
    #[serde(default)]
    pub proxy: Option<String>,

    /// Extra headers sent with every request
    #[serde(default = "defaults::headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            sitemap_timeout_secs: defaults::sitemap_timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            proxy: None,
            headers: defaults::headers(),
        }
    }
}

/// Remote site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Sitemap listing every published page
    #[serde(default = "defaults::sitemap_url")]
    pub sitemap_url: String,

    /// Search endpoint answering detail queries
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Token preceding the listing identifier in a listing URL
    #[serde(default = "defaults::listing_marker")]
    pub listing_marker: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sitemap_url: defaults::sitemap_url(),
            api_url: defaults::api_url(),
            listing_marker: defaults::listing_marker(),
        }
    }
}

/// Persisted file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::sitemap_file")]
    pub sitemap_file: String,

    #[serde(default = "defaults::ledger_file")]
    pub ledger_file: String,

    #[serde(default = "defaults::pending_file")]
    pub pending_file: String,

    #[serde(default = "defaults::records_file")]
    pub records_file: String,

    #[serde(default = "defaults::stats_file")]
    pub stats_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sitemap_file: defaults::sitemap_file(),
            ledger_file: defaults::ledger_file(),
            pending_file: defaults::pending_file(),
            records_file: defaults::records_file(),
            stats_file: defaults::stats_file(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.5938.63 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn sitemap_timeout() -> u64 {
        60
    }
    pub fn request_delay() -> u64 {
        0
    }
    pub fn max_concurrent() -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cpus + 4).min(32)
    }
    pub fn headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Accept".to_string(), "*/*".to_string()),
            (
                "Accept-Language".to_string(),
                "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            ),
        ])
    }

    // Source defaults
    pub fn sitemap_url() -> String {
        "https://www.costes-viager.com/sitemap.xml".into()
    }
    pub fn api_url() -> String {
        "https://www.costes-viager.com/api_se/annonces2".into()
    }
    pub fn listing_marker() -> String {
        "pieces-".into()
    }

    // Path defaults
    pub fn sitemap_file() -> String {
        "sitemaps/sitemap.xml".into()
    }
    pub fn ledger_file() -> String {
        "ledger/known_ids.txt".into()
    }
    pub fn pending_file() -> String {
        "ledger/pending_ids.txt".into()
    }
    pub fn records_file() -> String {
        "records/listings.jsonl".into()
    }
    pub fn stats_file() -> String {
        "stats.json".into()
    }
}
