// src/error.rs

//! Unified error handling for the listing watcher.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Listing marker could not be compiled into a pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// A sitemap document could not be parsed. Aborts the sync run.
    #[error("Malformed document {path}: {message}")]
    MalformedDocument { path: String, message: String },

    /// The snapshot could not be promoted into place. Aborts the sync run.
    #[error("Failed to promote {path}: {message}")]
    PersistenceRace { path: String, message: String },

    /// A single listing fetch failed
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a malformed document error for a file.
    pub fn malformed(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::MalformedDocument {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a snapshot promotion error for a file.
    pub fn persistence_race(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::PersistenceRace {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error only affects the request that produced it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Fetch { .. })
    }
}
