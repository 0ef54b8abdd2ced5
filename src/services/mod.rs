//! Service layer for the listing watcher.
//!
//! This module contains the network-facing logic:
//! - Sitemap change detection (`SitemapSynchronizer`)
//! - Listing detail retrieval (`ListingFetcher`)

mod listings;
mod sitemap;

pub use listings::ListingFetcher;
pub use sitemap::{SitemapSynchronizer, StagedSitemap, parse_urlset};
