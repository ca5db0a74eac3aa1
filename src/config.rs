//! Configuration types for periodical runs.

use crate::error::{PeriodicalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration shared by every periodical on this host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicalConfig {
    /// Root directory for ledger files (None = platform data dir).
    pub data_dir: Option<PathBuf>,
    /// Network reachability probing.
    pub reachability: ReachabilityConfig,
    /// Ledger behaviour.
    pub ledger: LedgerConfig,
}

/// Network reachability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    /// Endpoints probed in order; any response counts as reachable.
    pub endpoints: Vec<String>,
    /// Per-probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// How long a positive result is trusted, in seconds.
    pub freshness_secs: u64,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://www.google.com/".to_owned(),
                "https://one.one.one.one/".to_owned(),
            ],
            probe_timeout_ms: 1_000,
            freshness_secs: 60,
        }
    }
}

impl ReachabilityConfig {
    /// Per-probe timeout.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Freshness window for cached positive results.
    #[must_use]
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Hold an advisory lock file across check-then-append.
    pub exclusive: bool,
    /// Age after which a leftover lock file is evicted, in seconds.
    pub stale_lock_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            exclusive: false,
            stale_lock_secs: 6 * 3600,
        }
    }
}

impl LedgerConfig {
    /// Age after which a lock file is considered abandoned.
    #[must_use]
    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }
}

impl PeriodicalConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PeriodicalError::Config(e.to_string()))
    }

    /// Load configuration from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::from_file(path) {
            Err(PeriodicalError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PeriodicalError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::periodical_dirs::config_file()
    }

    /// Root directory for ledger files and task-owned data.
    #[must_use]
    pub fn data_root(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::periodical_dirs::data_dir)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PeriodicalConfig::default();
        assert_eq!(config.reachability.endpoints.len(), 2);
        assert_eq!(config.reachability.probe_timeout(), Duration::from_secs(1));
        assert_eq!(config.reachability.freshness(), Duration::from_secs(60));
        assert!(!config.ledger.exclusive);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PeriodicalConfig::default();
        config.data_dir = Some(PathBuf::from("/srv/periodical"));
        config.reachability.freshness_secs = 120;
        config.ledger.exclusive = true;

        config.save_to_file(&path).unwrap();
        let loaded = PeriodicalConfig::from_file(&path).unwrap();

        assert_eq!(loaded.data_dir, Some(PathBuf::from("/srv/periodical")));
        assert_eq!(loaded.reachability.freshness_secs, 120);
        assert!(loaded.ledger.exclusive);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = PeriodicalConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PeriodicalConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn load_or_default_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = PeriodicalConfig::load_or_default(&path);
        assert!(matches!(result, Err(PeriodicalError::Config(_))));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PeriodicalConfig = toml::from_str("[ledger]\nexclusive = true\n").unwrap();
        assert!(config.ledger.exclusive);
        assert_eq!(config.ledger.stale_lock_secs, 6 * 3600);
        assert_eq!(config.reachability.probe_timeout_ms, 1_000);
    }

    #[test]
    fn data_root_prefers_explicit_dir() {
        let config = PeriodicalConfig {
            data_dir: Some(PathBuf::from("/explicit")),
            ..PeriodicalConfig::default()
        };
        assert_eq!(config.data_root(), PathBuf::from("/explicit"));
    }
}
