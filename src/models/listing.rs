//! Listing identifiers and detail records.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Numeric identifier of a listing (the remote "dossier" id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub u64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListingId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(ListingId)
    }
}

/// Outcome of comparing a fresh sitemap download against the saved snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapChange {
    /// Whether the downloaded bytes differ from the snapshot
    pub changed: bool,
    /// URLs present in the new sitemap but not in the old one
    pub added_urls: BTreeSet<String>,
}

impl SitemapChange {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn added_count(&self) -> usize {
        self.added_urls.len()
    }
}

/// Raw detail response for one queried listing.
///
/// The payload is kept verbatim; only `results.annonces[0].dossier_id` is
/// inspected, to check the response answers the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    id: ListingId,
    raw: Value,
}

impl ListingRecord {
    const LISTING_POINTER: &'static str = "/results/annonces/0";

    /// Accept a detail response for `requested`.
    pub fn from_response(requested: ListingId, raw: Value) -> Result<Self> {
        let context = format!("listing {requested}");
        let listing = raw
            .pointer(Self::LISTING_POINTER)
            .ok_or_else(|| AppError::fetch(&context, "response has no results.annonces[0]"))?;

        let found = listing
            .get("dossier_id")
            .and_then(parse_id_value)
            .ok_or_else(|| AppError::fetch(&context, "listing has no usable dossier_id"))?;

        if found != requested {
            return Err(AppError::fetch(
                &context,
                format!("response describes listing {found}"),
            ));
        }

        Ok(Self { id: requested, raw })
    }

    /// Identifier the record was fetched for.
    pub fn id(&self) -> ListingId {
        self.id
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.raw)?)
    }
}

/// Identifiers may come back as numbers or numeric strings.
fn parse_id_value(value: &Value) -> Option<ListingId> {
    match value {
        Value::Number(n) => n.as_u64().map(ListingId),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
