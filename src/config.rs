//! Configuration for sync operations

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default assumed network throughput in bytes per second.
/// Runs of matched blocks shorter than one second's worth of download at this
/// rate are re-downloaded instead of copied locally.
pub const DEFAULT_ASSUMED_DOWNLOAD_SPEED: u64 = 125_000;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Suffix appended to the target path for the temporary output file
pub const DEFAULT_TEMP_SUFFIX: &str = ".part";

/// Sync options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Assumed network throughput, bytes per second
    pub assumed_download_speed: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum retries for a failed range request
    pub max_retries: u32,

    /// Retry delay base in milliseconds
    pub retry_delay_ms: u64,

    /// Suffix for the temporary output file
    pub temp_suffix: String,

    /// Show progress output
    pub progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            assumed_download_speed: DEFAULT_ASSUMED_DOWNLOAD_SPEED,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: 3,
            retry_delay_ms: 1000,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            progress: false,
        }
    }
}

impl SyncOptions {
    /// Load options from the default config file, or defaults if absent
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load options from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::io("reading config", e))?;
        let options: Self = toml::from_str(&contents)?;
        Ok(options)
    }

    /// Save options to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io("creating config dir", e))?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("serializing config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| Error::io("writing config", e))?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("blocksync").join("config.toml"))
            .ok_or_else(|| Error::config("could not determine config directory"))
    }

    /// Copy threshold in blocks for a given block size: runs of matched
    /// blocks must be strictly longer than this to stay local copies
    pub fn min_copy_block_count(&self, block_size: usize) -> u64 {
        self.assumed_download_speed / block_size as u64
    }

    /// Per-request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Temporary output path for a given target path
    pub fn temp_path(&self, target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(&self.temp_suffix);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SyncOptions::default();
        assert_eq!(options.assumed_download_speed, 125_000);
        assert_eq!(options.temp_suffix, ".part");
    }

    #[test]
    fn test_min_copy_block_count() {
        let options = SyncOptions::default();
        assert_eq!(options.min_copy_block_count(2048), 61);
        assert_eq!(options.min_copy_block_count(125_000), 1);
        // Larger blocks than the assumed rate: every matched run qualifies
        assert_eq!(options.min_copy_block_count(250_000), 0);
    }

    #[test]
    fn test_temp_path() {
        let options = SyncOptions::default();
        assert_eq!(
            options.temp_path(Path::new("/data/file.bin")),
            PathBuf::from("/data/file.bin.part")
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let mut options = SyncOptions::default();
        options.max_retries = 7;
        options.save_to(&path).unwrap();

        let loaded = SyncOptions::load_from(&path).unwrap();
        assert_eq!(loaded.max_retries, 7);
        assert_eq!(loaded.assumed_download_speed, DEFAULT_ASSUMED_DOWNLOAD_SPEED);
    }
}
