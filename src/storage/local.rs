//! Local filesystem primitives shared by the stores.
//!
//! Whole-file replacements go through [`write_atomic`] (write to a sibling
//! temp file, then rename) so a reader never sees a half-written file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ListingId;

/// Sibling temp path used while replacing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Ensure parent directory exists.
pub async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Write bytes to `path` without publishing them (caller renames later).
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Write bytes atomically (write to temp, then rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    write_file(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read bytes, returning None if file doesn't exist.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Remove a file; a missing file is not an error. Returns whether it existed.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Contents of a line-delimited identifier file.
#[derive(Debug, Default)]
pub struct IdLines {
    /// Identifiers in file order, first occurrence only
    pub ids: Vec<ListingId>,
    /// Lines repeating an earlier identifier
    pub duplicates: usize,
    /// Lines that are not an identifier
    pub invalid: usize,
}

impl IdLines {
    /// Whether a rewrite would change the file.
    pub fn needs_repair(&self) -> bool {
        self.duplicates > 0 || self.invalid > 0
    }
}

/// Read a line-delimited identifier file, deduplicating as it goes.
pub async fn read_id_lines(path: &Path) -> Result<IdLines> {
    let Some(bytes) = read_optional(path).await? else {
        return Ok(IdLines::default());
    };

    let text = String::from_utf8_lossy(&bytes);
    let mut seen = HashSet::new();
    let mut lines = IdLines::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<ListingId>() {
            Ok(id) if seen.insert(id) => lines.ids.push(id),
            Ok(_) => lines.duplicates += 1,
            Err(_) => {
                log::warn!("Dropping unreadable line {:?} in {}", line, path.display());
                lines.invalid += 1;
            }
        }
    }
    Ok(lines)
}

/// Atomically replace an identifier file with `ids`, one per line.
pub async fn write_id_lines(path: &Path, ids: &[ListingId]) -> Result<()> {
    let mut text = String::with_capacity(ids.len() * 8);
    for id in ids {
        text.push_str(&id.to_string());
        text.push('\n');
    }
    write_atomic(path, text.as_bytes()).await
}

/// Append identifiers to a line-delimited file.
pub async fn append_id_lines(path: &Path, ids: &[ListingId]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    ensure_parent(path).await?;
    let mut text = String::new();
    for id in ids {
        text.push_str(&id.to_string());
        text.push('\n');
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
