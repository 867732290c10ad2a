//! Configuration file parser for ~/.config/feedshelf/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FeedFetcher, SortMethod, SortOrder, Sorting};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location of the feeds document. `None` = `feeds.json` next to the config.
    pub feeds_file: Option<PathBuf>,

    /// Default entry ordering key ("date" or "title").
    pub sort_method: SortMethod,

    /// Default entry ordering direction ("ascending" or "descending").
    pub sort_order: SortOrder,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries for rate-limited, 5xx or truncated responses. 0 = no retry.
    pub max_retries: u32,

    /// How many feeds a snapshot fetches at once.
    pub max_concurrent_fetches: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds_file: None,
            sort_method: SortMethod::Date,
            sort_order: SortOrder::Descending,
            request_timeout_secs: FeedFetcher::DEFAULT_TIMEOUT.as_secs(),
            max_retries: FeedFetcher::DEFAULT_MAX_RETRIES,
            max_concurrent_fetches: 4,
            user_agent: format!("feedshelf/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "feeds_file",
                "sort_method",
                "sort_order",
                "request_timeout_secs",
                "max_retries",
                "max_concurrent_fetches",
                "user_agent",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sort_method = %config.sort_method,
            sort_order = %config.sort_order,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn sorting(&self) -> Sorting {
        Sorting::new(self.sort_method, self.sort_order)
    }

    /// Resolve the feeds document path, defaulting to `config_dir/feeds.json`.
    pub fn feeds_path(&self, config_dir: &Path) -> PathBuf {
        self.feeds_file
            .clone()
            .unwrap_or_else(|| config_dir.join("feeds.json"))
    }

    /// Build a fetcher with this configuration's HTTP settings.
    pub fn fetcher(&self) -> Result<FeedFetcher, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .build()?;

        Ok(FeedFetcher::new(client)
            .with_timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
            .with_max_retries(self.max_retries))
    }
}

// ============================================================================
// Tests
// ============================================================================
