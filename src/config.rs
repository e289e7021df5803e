//! User settings and per-run download configuration.
//!
//! `Settings` is the optional on-disk TOML file; `DownloadConfig` is what a
//! single run of the [`Downloader`](crate::downloader::Downloader) consumes.
use crate::partition::Partition;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at an alternative settings file.
pub const CONFIG_ENV: &str = "RANGEFETCH_CONFIG";
/// Settings file looked up in the current directory.
pub const CONFIG_FILE: &str = "rangefetch.toml";

pub const DEFAULT_THREADS: u64 = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("rangefetch/", env!("CARGO_PKG_VERSION"));

/// Values read from `rangefetch.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of ranges in fixed-count mode.
    pub threads: Option<u64>,
    /// Working directory for segments and the final file.
    pub default_dir: Option<String>,
    /// Maximum range size in bytes; enables size-bounded partitioning.
    pub block_size: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Settings {
    /// Loads settings from `$RANGEFETCH_CONFIG` or `./rangefetch.toml`.
    ///
    /// A missing file is not an error and yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }
}

/// Configuration of one download run.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory holding segment files and the assembled output.
    pub dir: PathBuf,
    /// Output filename; when `None` the probed name is used.
    pub filename: Option<String>,
    pub partition: Partition,
    /// Connect timeout, and the longest a request may go without receiving data.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            filename: None,
            partition: Partition::FixedCount(
                NonZeroU64::new(DEFAULT_THREADS).unwrap_or(NonZeroU64::MIN),
            ),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DownloadConfig {
    /// Builds a run configuration from file settings, falling back to defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        let partition = match settings.block_size.and_then(NonZeroU64::new) {
            Some(block) => Partition::BlockSize(block),
            None => settings
                .threads
                .and_then(NonZeroU64::new)
                .map(Partition::FixedCount)
                .unwrap_or(defaults.partition),
        };

        Self {
            dir: settings
                .default_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.dir),
            filename: None,
            partition,
            timeout: settings
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: settings.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    /// Builds the shared HTTP client for a run.
    pub fn client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.timeout)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = Settings::load_from(&dir.path().join("absent.toml"))?;
        assert_eq!(settings, Settings::default());
        Ok(())
    }

    #[test]
    fn test_parse_settings_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "threads = 8\ndefault_dir = \"tmp\"\ntimeout_secs = 5")?;

        let settings = Settings::load_from(file.path())?;
        assert_eq!(settings.threads, Some(8));
        assert_eq!(settings.default_dir.as_deref(), Some("tmp"));

        let config = DownloadConfig::from_settings(&settings);
        assert_eq!(config.dir, PathBuf::from("tmp"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(matches!(config.partition, Partition::FixedCount(n) if n.get() == 8));
        Ok(())
    }

    #[test]
    fn test_block_size_selects_size_bounded_mode() {
        let settings = Settings {
            threads: Some(8),
            block_size: Some(100 * 1024 * 1024),
            ..Default::default()
        };
        let config = DownloadConfig::from_settings(&settings);
        assert!(matches!(config.partition, Partition::BlockSize(b) if b.get() == 100 * 1024 * 1024));
    }

    #[test]
    fn test_invalid_settings_file_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "threads = \"many\"")?;
        assert!(Settings::load_from(file.path()).is_err());
        Ok(())
    }
}
