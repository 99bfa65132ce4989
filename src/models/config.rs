//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Polling cadence and backoff settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// HTTP fetch behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Content normalization settings
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Persistence location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Write configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.tracker.min_interval_secs == 0 {
            return Err(AppError::validation("tracker.min_interval_secs must be > 0"));
        }
        if self.tracker.default_interval_secs < self.tracker.min_interval_secs {
            return Err(AppError::validation(
                "tracker.default_interval_secs must be >= tracker.min_interval_secs",
            ));
        }
        if self.tracker.backoff_cap == 0 {
            return Err(AppError::validation("tracker.backoff_cap must be > 0"));
        }
        if self.tracker.max_concurrent == 0 {
            return Err(AppError::validation("tracker.max_concurrent must be > 0"));
        }
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.storage.key.trim().is_empty() {
            return Err(AppError::validation("storage.key is empty"));
        }
        Ok(())
    }
}

/// Polling cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Interval used when none is given for a new site
    #[serde(default = "defaults::default_interval")]
    pub default_interval_secs: u64,

    /// Lower bound for any per-site interval
    #[serde(default = "defaults::min_interval")]
    pub min_interval_secs: u64,

    /// Largest multiplier applied to the interval after repeated failures
    #[serde(default = "defaults::backoff_cap")]
    pub backoff_cap: u32,

    /// Concurrent fetches for a one-shot check of every site
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl TrackerConfig {
    /// Clamp a requested interval to the configured minimum.
    pub fn clamp_interval(&self, requested_secs: u64) -> u64 {
        if requested_secs < self.min_interval_secs {
            log::warn!(
                "Interval {}s is below the minimum, using {}s",
                requested_secs,
                self.min_interval_secs
            );
            return self.min_interval_secs;
        }
        requested_secs
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: defaults::default_interval(),
            min_interval_secs: defaults::min_interval(),
            backoff_cap: defaults::backoff_cap(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Upper bound for a single fetch, in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Content normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NormalizerConfig {
    /// Tags stripped in addition to script, style, link and meta
    #[serde(default)]
    pub extra_ignored_tags: Vec<String>,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the local key-value files
    #[serde(default = "defaults::root_dir")]
    pub root_dir: PathBuf,

    /// Key under which the tracked-site set is stored
    #[serde(default = "defaults::storage_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
            key: defaults::storage_key(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Tracker defaults
    pub fn default_interval() -> u64 {
        30
    }
    pub fn min_interval() -> u64 {
        30
    }
    pub fn backoff_cap() -> u32 {
        8
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; sitewatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        20
    }

    // Storage defaults
    pub fn root_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn storage_key() -> String {
        "tracked-websites".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
