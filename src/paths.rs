//! Path utilities for depot files.
//!
//! - [`depot_dir`] - `~/.depot/` (base directory, overridable with `DEPOT_HOME`)
//! - [`config_path`] - `~/.depot/depot.toml`
//! - [`data_dir`] - `~/.depot/data/` (blobs and metadata database)

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable overriding the depot home directory.
pub const DEPOT_HOME_ENV: &str = "DEPOT_HOME";

/// Get the depot base directory.
///
/// Resolution order:
/// 1. `DEPOT_HOME` environment variable (if set and non-empty)
/// 2. `~/.depot/` (default)
pub fn depot_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(DEPOT_HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".depot"))
}

/// Get the default config file path: `~/.depot/depot.toml`
pub fn config_path() -> Result<PathBuf> {
    Ok(depot_dir()?.join("depot.toml"))
}

/// Get the default data directory: `~/.depot/data/`
pub fn data_dir() -> Result<PathBuf> {
    Ok(depot_dir()?.join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_base() {
        let base = depot_dir().unwrap();
        assert_eq!(config_path().unwrap(), base.join("depot.toml"));
        assert_eq!(data_dir().unwrap(), base.join("data"));
    }
}
