//! Error taxonomy for scraping runs

use std::path::PathBuf;
use thiserror::Error;

/// Errors recorded while scraping pages and libraries.
///
/// Only `UrlInvalid` and the configuration variants stop an operation before
/// it starts. The rest are recorded on the page or library they belong to.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid DeepWiki URL '{url}': {reason}")]
    UrlInvalid { url: String, reason: String },

    #[error("failed to fetch {url} after {attempts} attempt(s): {reason}")]
    FetchFailure {
        url: String,
        reason: String,
        attempts: u32,
    },

    #[error("no navigation found on {url}")]
    NavigationNotFound { url: String },

    #[error("failed to convert {url}: {reason}")]
    ConversionFailure { url: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScrapeError {
    /// Short machine-readable kind, used in JSON summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::UrlInvalid { .. } => "url_invalid",
            ScrapeError::FetchFailure { .. } => "fetch_failure",
            ScrapeError::NavigationNotFound { .. } => "navigation_not_found",
            ScrapeError::ConversionFailure { .. } => "conversion_failure",
            ScrapeError::PersistenceFailure { .. } => "persistence_failure",
            ScrapeError::Config(_) | ScrapeError::ConfigFile { .. } => "config",
            ScrapeError::Io { .. } => "io",
        }
    }

    /// Whether this error is a diagnostic that does not reduce yield
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, ScrapeError::NavigationNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        let err = ScrapeError::NavigationNotFound {
            url: "https://deepwiki.com/a/b".to_string(),
        };
        assert_eq!(err.kind(), "navigation_not_found");
        assert!(err.is_diagnostic());

        let err = ScrapeError::FetchFailure {
            url: "https://deepwiki.com/a/b".to_string(),
            reason: "timeout".to_string(),
            attempts: 6,
        };
        assert_eq!(err.kind(), "fetch_failure");
        assert!(!err.is_diagnostic());
    }

    #[test]
    fn test_display() {
        let err = ScrapeError::UrlInvalid {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid DeepWiki URL 'nope': relative URL without a base"
        );
    }
}
