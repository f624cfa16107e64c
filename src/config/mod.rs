//! Configuration management for the offerhound crawler
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::render::SessionOptions;
use crate::utils::retry::RetryConfig;

/// Browser user agent presented to the source
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Listing search endpoint; `{keywords}` is replaced by the encoded term
pub const DEFAULT_SEARCH_URL: &str =
    "https://s.1688.com/selloffer/offer_search.htm?charset=utf8&keywords={keywords}";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// Request pacing and retry delays
    pub pacing: PacingConfig,

    /// File and catalog locations
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User agent string
    pub user_agent: String,

    /// Accept invalid TLS certificates
    pub ignore_tls_errors: bool,

    /// Run the browser without a window
    pub headless: bool,

    /// Search URL template containing `{keywords}`
    pub search_url_template: String,

    /// Timeout for a single navigation in seconds
    pub navigation_timeout_secs: u64,

    /// Per-attempt timeout for selector waits in seconds
    pub selector_timeout_secs: u64,

    /// Attempts at the listing page-load boundary
    pub load_attempts: u32,

    /// Attempts for the initial navigation of a run
    pub navigation_attempts: u32,

    /// Page bound until the source reports its own
    pub default_max_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ignore_tls_errors: true,
            headless: true,
            search_url_template: DEFAULT_SEARCH_URL.to_string(),
            navigation_timeout_secs: 60,
            selector_timeout_secs: 30,
            load_attempts: 3,
            navigation_attempts: 3,
            default_max_pages: crate::models::DEFAULT_MAX_PAGES,
        }
    }
}

/// Inclusive millisecond range a random delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    pub fn as_tuple(&self) -> (u64, u64) {
        (self.min_ms, self.max_ms)
    }
}

/// Pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Delay after each page's extraction, before advancing
    pub page_delay: DelayRange,

    /// Fixed part of the delay between listing load attempts
    pub load_retry_base_ms: u64,

    /// Random part of the delay between listing load attempts
    pub load_retry_jitter: DelayRange,

    /// Fixed part of the delay between initial navigation attempts
    pub navigation_retry_base_ms: u64,

    /// Random part of the delay between initial navigation attempts
    pub navigation_retry_jitter: DelayRange,

    /// Wait after clicking a color variant before re-reading sizes
    pub variant_settle_ms: u64,

    /// Delay after a run releases its session
    pub post_run_delay: DelayRange,

    /// Image downloads per second
    pub image_rate_per_sec: u32,

    /// Timeout of a single image download in seconds
    pub image_timeout_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_delay: DelayRange::new(2_000, 5_000),
            load_retry_base_ms: 5_000,
            load_retry_jitter: DelayRange::new(5_000, 10_000),
            navigation_retry_base_ms: 10_000,
            navigation_retry_jitter: DelayRange::new(5_000, 15_000),
            variant_settle_ms: 500,
            post_run_delay: DelayRange::new(5_000, 10_000),
            image_rate_per_sec: 4,
            image_timeout_secs: 15,
        }
    }
}

impl PacingConfig {
    /// No waiting anywhere; used for snapshot replays and tests
    pub fn instant() -> Self {
        Self {
            page_delay: DelayRange::zero(),
            load_retry_base_ms: 0,
            load_retry_jitter: DelayRange::zero(),
            navigation_retry_base_ms: 0,
            navigation_retry_jitter: DelayRange::zero(),
            variant_settle_ms: 0,
            post_run_delay: DelayRange::zero(),
            ..Default::default()
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite catalog database path
    pub catalog_path: PathBuf,

    /// Catalog collection (table) name
    pub collection: String,

    /// Pagination progress file
    pub state_file: PathBuf,

    /// Session cookie jar file
    pub cookie_file: PathBuf,

    /// Root directory for downloaded images
    pub image_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/catalog.db"),
            collection: String::from("products"),
            state_file: PathBuf::from("data/crawl_state.json"),
            cookie_file: PathBuf::from("data/cookies.json"),
            image_dir: PathBuf::from("assets/images"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let crawler = CrawlerConfig {
            user_agent: env_or("OFFERHOUND_USER_AGENT", defaults.crawler.user_agent),
            ignore_tls_errors: env_or(
                "OFFERHOUND_IGNORE_TLS_ERRORS",
                defaults.crawler.ignore_tls_errors,
            ),
            headless: env_or("OFFERHOUND_HEADLESS", defaults.crawler.headless),
            search_url_template: env_or(
                "OFFERHOUND_SEARCH_URL",
                defaults.crawler.search_url_template,
            ),
            navigation_timeout_secs: env_or(
                "OFFERHOUND_NAVIGATION_TIMEOUT",
                defaults.crawler.navigation_timeout_secs,
            ),
            selector_timeout_secs: env_or(
                "OFFERHOUND_SELECTOR_TIMEOUT",
                defaults.crawler.selector_timeout_secs,
            ),
            load_attempts: env_or("OFFERHOUND_LOAD_ATTEMPTS", defaults.crawler.load_attempts),
            navigation_attempts: env_or(
                "OFFERHOUND_NAVIGATION_ATTEMPTS",
                defaults.crawler.navigation_attempts,
            ),
            default_max_pages: env_or("OFFERHOUND_MAX_PAGES", defaults.crawler.default_max_pages),
        };

        let pacing = PacingConfig {
            variant_settle_ms: env_or(
                "OFFERHOUND_VARIANT_SETTLE_MS",
                defaults.pacing.variant_settle_ms,
            ),
            image_rate_per_sec: env_or(
                "OFFERHOUND_IMAGE_RATE",
                defaults.pacing.image_rate_per_sec,
            ),
            ..defaults.pacing
        };

        let storage = StorageConfig {
            catalog_path: env_or("OFFERHOUND_CATALOG_PATH", defaults.storage.catalog_path),
            collection: env_or("OFFERHOUND_COLLECTION", defaults.storage.collection),
            state_file: env_or("OFFERHOUND_STATE_FILE", defaults.storage.state_file),
            cookie_file: env_or("OFFERHOUND_COOKIE_FILE", defaults.storage.cookie_file),
            image_dir: env_or("OFFERHOUND_IMAGE_DIR", defaults.storage.image_dir),
        };

        let logging = LoggingConfig {
            level: env_or("OFFERHOUND_LOG_LEVEL", defaults.logging.level),
            format: env_or("OFFERHOUND_LOG_FORMAT", defaults.logging.format),
        };

        Ok(Self {
            crawler,
            pacing,
            storage,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.load_attempts == 0 {
            anyhow::bail!("load_attempts must be greater than 0");
        }

        if self.crawler.navigation_attempts == 0 {
            anyhow::bail!("navigation_attempts must be greater than 0");
        }

        if self.crawler.default_max_pages == 0 {
            anyhow::bail!("default_max_pages must be greater than 0");
        }

        if !self.crawler.search_url_template.contains("{keywords}") {
            anyhow::bail!("search_url_template must contain a {{keywords}} placeholder");
        }

        for (name, range) in [
            ("page_delay", self.pacing.page_delay),
            ("load_retry_jitter", self.pacing.load_retry_jitter),
            ("navigation_retry_jitter", self.pacing.navigation_retry_jitter),
            ("post_run_delay", self.pacing.post_run_delay),
        ] {
            if !range.is_valid() {
                anyhow::bail!("{name}: min_ms must not exceed max_ms");
            }
        }

        if self.pacing.image_rate_per_sec == 0 {
            anyhow::bail!("image_rate_per_sec must be greater than 0");
        }

        if self.storage.collection.is_empty()
            || !self
                .storage
                .collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!("collection must be a non-empty identifier");
        }

        Ok(())
    }

    /// Session options for the rendering backend
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            user_agent: self.crawler.user_agent.clone(),
            ignore_tls_errors: self.crawler.ignore_tls_errors,
            headless: self.crawler.headless,
        }
    }

    /// Get navigation timeout as Duration
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.navigation_timeout_secs)
    }

    /// Get selector wait timeout as Duration
    #[must_use]
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.selector_timeout_secs)
    }

    /// Retry policy at the listing page-load boundary
    #[must_use]
    pub fn load_retry(&self) -> RetryConfig {
        RetryConfig::fixed_with_jitter(
            self.crawler.load_attempts,
            self.pacing.load_retry_base_ms,
            self.pacing.load_retry_jitter.as_tuple(),
        )
    }

    /// Retry policy for the initial navigation of a run
    #[must_use]
    pub fn navigation_retry(&self) -> RetryConfig {
        RetryConfig::fixed_with_jitter(
            self.crawler.navigation_attempts,
            self.pacing.navigation_retry_base_ms,
            self.pacing.navigation_retry_jitter.as_tuple(),
        )
    }
}
