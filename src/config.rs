//! Scraper configuration
//!
//! All settings are fixed at construction and shared read-only by every
//! component of a scraper instance. Values come from defaults, an optional
//! YAML file, and CLI overrides, in that order.

use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DOMAIN: &str = "deepwiki.com";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Markdown heading convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeadingStyle {
    /// `#`-prefixed headings at every level
    #[default]
    Atx,
    /// Underlined headings for levels 1-2, `#` prefix deeper
    Setext,
}

impl std::fmt::Display for HeadingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadingStyle::Atx => write!(f, "ATX"),
            HeadingStyle::Setext => write!(f, "SETEXT"),
        }
    }
}

/// Attempts per fetch path and the backoff between them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): backoff * 2^(attempt-1)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScraperConfig {
    /// Root directory for `<library>/<title>.md` files
    pub output_dir: PathBuf,
    pub headless: bool,
    /// Set to false to go straight to the HTTP path
    pub use_browser: bool,
    pub heading_style: HeadingStyle,
    pub strip_navigation: bool,
    /// Rewrite `[text](url)` links to plain `text`
    pub strip_link_urls: bool,
    /// Return the library root page ahead of its navigation children
    pub include_root: bool,
    pub site_domain: String,
    pub page_concurrency: usize,
    pub library_concurrency: usize,
    pub page_delay_ms: u64,
    /// Ceiling for a single navigation or HTTP request
    pub timeout_ms: u64,
    /// Ceiling for waiting on dynamic content after navigation
    pub settle_ms: u64,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            headless: true,
            use_browser: true,
            heading_style: HeadingStyle::Atx,
            strip_navigation: true,
            strip_link_urls: false,
            include_root: false,
            site_domain: DEFAULT_DOMAIN.to_string(),
            page_concurrency: 1,
            library_concurrency: 1,
            page_delay_ms: 1000,
            timeout_ms: 30_000,
            settle_ms: 2_000,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScraperConfig {
    /// Load a config from a YAML file, filling missing keys with defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ScrapeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content).map_err(|source| ScrapeError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_concurrency == 0 {
            return Err(ScrapeError::Config("page_concurrency must be at least 1".into()));
        }
        if self.library_concurrency == 0 {
            return Err(ScrapeError::Config("library_concurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ScrapeError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ScrapeError::Config("timeout_ms must be greater than 0".into()));
        }
        if self.site_domain.trim().is_empty() {
            return Err(ScrapeError::Config("site_domain must not be empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}
