//! Page and library records plus the JSON run summary

use crate::error::ScrapeError;
use crate::wiki_url::DeepWikiUrl;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// How a page's HTML was retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Browser,
    Fallback,
}

impl std::fmt::Display for Via {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Via::Browser => write!(f, "browser"),
            Via::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of scraping one page
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    /// Raw HTML, kept for diagnostics only
    #[serde(skip)]
    pub html: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<Via>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    pub fn converted(url: &str, title: String, content: String, html: String, via: Option<Via>) -> Self {
        Self {
            url: url.to_string(),
            title,
            content,
            html,
            success: true,
            via,
            error: None,
        }
    }

    /// An unsuccessful record: empty content, placeholder title from the URL
    pub fn failed(url: &str, html: String, via: Option<Via>, error: &ScrapeError) -> Self {
        Self {
            url: url.to_string(),
            title: placeholder_title(url),
            content: String::new(),
            html,
            success: false,
            via,
            error: Some(error.to_string()),
        }
    }
}

/// Title derived from the URL's last path segment, for pages without one
pub fn placeholder_title(url: &str) -> String {
    let parsed = DeepWikiUrl::parse(url);
    let hint = parsed.title_hint();
    if !hint.is_empty() {
        return hint;
    }
    let trimmed = url.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg.to_string(),
        _ => "untitled".to_string(),
    }
}

/// Everything known about one library scrape
#[derive(Debug)]
pub struct LibraryReport {
    pub library: String,
    pub url: String,
    pub pages: Vec<PageRecord>,
    pub errors: Vec<ScrapeError>,
    pub files: Vec<PathBuf>,
}

impl LibraryReport {
    pub fn new(library: &str, url: &str) -> Self {
        Self {
            library: library.to_string(),
            url: url.to_string(),
            pages: Vec::new(),
            errors: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.pages.iter().filter(|p| p.success).count()
    }

    pub fn failed(&self) -> usize {
        self.pages.len() - self.succeeded()
    }

    /// No page of the library could be produced
    pub fn is_total_failure(&self) -> bool {
        self.succeeded() == 0
    }

    pub fn navigation_found(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| matches!(e, ScrapeError::NavigationNotFound { .. }))
    }
}

/// Compact per-library summary (stdout JSON)
#[derive(Debug, Serialize)]
pub struct LibrarySummary {
    pub library: String,
    pub url: String,
    pub pages: usize,
    pub ok: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub kind: &'static str,
    pub message: String,
}

/// Full run summary
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub output_dir: String,
    pub libraries: Vec<LibrarySummary>,
    pub ok: usize,
    pub failed: usize,
}

impl From<&LibraryReport> for LibrarySummary {
    fn from(report: &LibraryReport) -> Self {
        Self {
            library: report.library.clone(),
            url: report.url.clone(),
            pages: report.pages.len(),
            ok: report.succeeded(),
            failed: report.failed(),
            files: report.files.iter().map(|p| p.display().to_string()).collect(),
            errors: report
                .errors
                .iter()
                .map(|e| ErrorEntry {
                    kind: e.kind(),
                    message: e.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_record_invariant() {
        let err = ScrapeError::FetchFailure {
            url: "https://deepwiki.com/o/lib/4-build-system".to_string(),
            reason: "timeout".to_string(),
            attempts: 3,
        };
        let record = PageRecord::failed("https://deepwiki.com/o/lib/4-build-system", String::new(), None, &err);
        assert!(!record.success);
        assert!(record.content.is_empty());
        assert_eq!(record.title, "4 build system");
        assert!(record.error.unwrap().contains("timeout"));
    }

    #[test]
    fn test_placeholder_title_fallbacks() {
        assert_eq!(placeholder_title("https://deepwiki.com/o/lib/"), "lib");
        assert_eq!(placeholder_title("nonsense"), "nonsense");
        assert_eq!(placeholder_title(""), "untitled");
    }

    #[test]
    fn test_serialize_skips_html() {
        let record = PageRecord::converted(
            "https://deepwiki.com/o/lib",
            "Overview".to_string(),
            "# Overview".to_string(),
            "<h1>Overview</h1>".to_string(),
            Some(Via::Fallback),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"via\":\"fallback\""));
        assert!(!json.contains("<h1>"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_report_counts() {
        let mut report = LibraryReport::new("lib", "https://deepwiki.com/o/lib");
        assert!(report.is_total_failure());
        report.pages.push(PageRecord::converted("u", "t".into(), "c".into(), String::new(), None));
        report.errors.push(ScrapeError::NavigationNotFound { url: "u".into() });
        assert_eq!(report.succeeded(), 1);
        assert!(!report.is_total_failure());
        assert!(!report.navigation_found());

        let summary = LibrarySummary::from(&report);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.errors[0].kind, "navigation_not_found");
    }
}
