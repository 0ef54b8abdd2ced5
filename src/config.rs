// src/config.rs

//! Configuration loading utilities.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// File name of the configuration inside the storage directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Load the configuration for a storage directory.
///
/// Falls back to defaults only when `config.toml` is missing, then applies
/// environment overrides and validates the result.
pub fn load_config(storage_dir: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(storage_dir.join(CONFIG_FILE))?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.source.listing_marker, "pieces-");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[crawler]\nmax_concurrent = 0\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_not_replaced_by_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "full_reset = tru\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(AppError::Toml(_))));
    }

    #[test]
    fn test_file_values_are_used() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[source]\nlisting_marker = \"lot-\"\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.source.listing_marker, "lot-");
    }
}
