//! Configuration management for Tululu.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories. Command-line flags are applied
//! on top of the loaded file by the binary.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Application name used for config directory.
const APP_NAME: &str = "Tululu";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target site settings.
    pub site: SiteConfig,

    /// Crawl behavior settings.
    pub crawl: CrawlConfig,

    /// File paths.
    pub paths: PathsConfig,
}

/// Settings for the catalog site being crawled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root; category and text URLs are built from it.
    pub base_url: String,

    /// Path segment of the category listing (`/<category_path>/<page>/`).
    pub category_path: String,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Per-request timeout in seconds.
    pub request_timeout_sec: u64,

    /// Accept invalid TLS certificates.
    ///
    /// The catalog site has served a self-signed certificate for years, so
    /// this is on by default for this host only. It is not a general policy.
    pub insecure_tls: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tululu.org".to_string(),
            category_path: "l55".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            request_timeout_sec: 30,
            insecure_tls: true,
        }
    }
}

impl SiteConfig {
    /// Returns the request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    /// Parses the configured site root.
    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "site.base_url".to_string(),
            message: e.to_string(),
        })
    }
}

/// What to do with a detail page whose markup cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseFailurePolicy {
    /// Treat the book as missing and move on.
    #[default]
    Skip,
    /// Treat the page as a transient glitch and fetch it again.
    Retry,
}

/// Crawl behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Pause after a connection failure before the next attempt, in seconds.
    pub retry_delay_sec: f64,

    /// Delay before every request in seconds.
    pub delay_between_requests_sec: f64,

    /// Handling of detail pages with missing markup.
    pub on_parse_error: ParseFailurePolicy,

    /// Write the book id into each serialized record.
    pub include_id: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            retry_delay_sec: 5.0,
            delay_between_requests_sec: 0.0,
            on_parse_error: ParseFailurePolicy::Skip,
            include_id: false,
        }
    }
}

impl CrawlConfig {
    /// Returns the retry pause as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_sec.max(0.0))
    }
}

/// File path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory for books, images and the record file.
    pub dest_folder: PathBuf,

    /// Record file; relative paths are resolved against `dest_folder`.
    pub json_path: PathBuf,

    /// Append-only log file.
    pub log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dest_folder: PathBuf::from("."),
            json_path: PathBuf::from("books.json"),
            log_file: PathBuf::from("app.log"),
        }
    }
}

impl PathsConfig {
    /// Directory receiving the downloaded texts.
    pub fn books_dir(&self) -> PathBuf {
        self.dest_folder.join("books")
    }

    /// Directory receiving the downloaded covers.
    pub fn images_dir(&self) -> PathBuf {
        self.dest_folder.join("images")
    }

    /// Full path of the record file.
    pub fn records_path(&self) -> PathBuf {
        self.dest_folder.join(&self.json_path)
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.base_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("site.base_url".to_string()));
        }
        self.site.base()?;

        if self.site.category_path.trim_matches('/').is_empty() {
            return Err(ConfigError::MissingValue("site.category_path".to_string()));
        }

        for (key, value) in [
            ("crawl.retry_delay_sec", self.crawl.retry_delay_sec),
            (
                "crawl.delay_between_requests_sec",
                self.crawl.delay_between_requests_sec,
            ),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be a non-negative number of seconds".to_string(),
                });
            }
        }

        Ok(())
    }
}
