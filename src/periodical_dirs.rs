//! Centralized directory paths for periodical tasks.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/periodical/` | `~/.local/share/periodical/` |
//! | Config | `~/Library/Application Support/periodical/` | `~/.config/periodical/` |
//!
//! # Environment Overrides
//!
//! - `PERIODICAL_DATA_DIR` overrides [`data_dir`]
//! - `PERIODICAL_CONFIG_DIR` overrides [`config_dir`]

use std::path::{Path, PathBuf};

/// Name of the directory under the data root holding ledger files.
pub const PERFORMED_DIR: &str = "performed";

/// Data root directory.
///
/// Resolves to `dirs::data_dir()/periodical/` by default. Override with
/// the `PERIODICAL_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PERIODICAL_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("periodical"))
        .unwrap_or_else(|| PathBuf::from("/tmp/periodical-data"))
}

/// Config directory.
///
/// Resolves to `dirs::config_dir()/periodical/` by default. Override with
/// the `PERIODICAL_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PERIODICAL_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("periodical"))
        .unwrap_or_else(|| PathBuf::from("/tmp/periodical-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ledger file for one task: `<data_root>/performed/<task_name>.txt`.
#[must_use]
pub fn ledger_file(data_root: &Path, task_name: &str) -> PathBuf {
    data_root
        .join(PERFORMED_DIR)
        .join(format!("{task_name}.txt"))
}
