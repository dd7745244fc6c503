//! Library scraping: fetch root, discover pages, fetch and convert each, persist
//!
//! A scraper instance owns at most one browser session. Multi-library runs
//! with `library_concurrency > 1` fork independent instances, each with its
//! own session, instead of sharing one across concurrent navigations.

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::fetch::{FetchOutcome, PageFetcher};
use crate::markdown::{Conversion, MarkdownConverter};
use crate::navigation::{discover, NavEntry};
use crate::schema::{LibraryReport, PageRecord, Via};
use crate::wiki_url::DeepWikiUrl;
use crate::writer::FileWriter;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub struct DeepWikiScraper {
    config: Arc<ScraperConfig>,
    fetcher: PageFetcher,
    converter: MarkdownConverter,
    writer: Arc<FileWriter>,
}

impl DeepWikiScraper {
    /// Validate config and probe for a browser; nothing is launched yet
    pub fn new(config: ScraperConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = PageFetcher::from_config(&config)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Use a prepared fetcher (custom or scripted sources)
    pub fn with_fetcher(config: ScraperConfig, fetcher: PageFetcher) -> Self {
        let converter = MarkdownConverter::from_config(&config);
        let writer = Arc::new(FileWriter::new(config.output_dir.clone()));
        Self {
            config: Arc::new(config),
            fetcher,
            converter,
            writer,
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn has_browser(&self) -> bool {
        self.fetcher.has_browser()
    }

    /// Sibling instance: same settings and writer, separate browser session
    fn fork(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            fetcher: self.fetcher.fork(),
            converter: self.converter.clone(),
            writer: Arc::clone(&self.writer),
        }
    }

    fn parse_url(&self, url: &str) -> DeepWikiUrl {
        DeepWikiUrl::parse_for_domain(url, &self.config.site_domain)
    }

    pub fn convert_page(&self, html: &str, url: Option<&str>) -> Conversion {
        self.converter.convert_page(html, url)
    }

    /// Scrape one page. `None` for an invalid URL or when every fetch failed.
    pub async fn scrape_page(&self, url: &str) -> Option<PageRecord> {
        let parsed = self.parse_url(url);
        if !parsed.is_valid() {
            warn!(url, "invalid DeepWiki URL: {}", parsed.invalid_reason().unwrap_or(""));
            return None;
        }
        match self.fetcher.fetch(url).await {
            FetchOutcome::Rendered { html, via } => Some(self.to_record(url, html, via, None)),
            FetchOutcome::Failure { reason, attempts } => {
                error!(url, attempts, "failed to fetch page: {}", reason);
                None
            }
        }
    }

    pub async fn scrape_library(&self, url: &str, save_files: bool) -> Vec<PageRecord> {
        self.scrape_library_report(url, save_files).await.pages
    }

    /// Scrape a whole library, keeping errors and written paths
    pub async fn scrape_library_report(&self, url: &str, save_files: bool) -> LibraryReport {
        let root = self.parse_url(url);
        let library = root.library_name().to_string();
        let mut report = LibraryReport::new(&library, url);

        if !root.is_valid() {
            let reason = root.invalid_reason().unwrap_or("invalid").to_string();
            error!(url, "invalid DeepWiki URL: {}", reason);
            report.errors.push(ScrapeError::UrlInvalid {
                url: url.to_string(),
                reason,
            });
            return report;
        }

        info!(library = %library, "scraping library");

        let (root_html, root_via) = match self.fetcher.fetch(url).await {
            FetchOutcome::Rendered { html, via } => (html, via),
            FetchOutcome::Failure { reason, attempts } => {
                error!(url, attempts, "failed to fetch library root: {}", reason);
                report.errors.push(ScrapeError::FetchFailure {
                    url: url.to_string(),
                    reason,
                    attempts,
                });
                return report;
            }
        };

        let children = match discover(&root_html, &root) {
            Ok(graph) if !graph.is_empty() => Some(graph.into_children()),
            Ok(_) => {
                warn!(url, "navigation has no pages for this library, using root page only");
                report.errors.push(ScrapeError::NavigationNotFound { url: url.to_string() });
                None
            }
            Err(e) => {
                warn!(url, "{}, using root page only", e);
                report.errors.push(e);
                None
            }
        };

        match children {
            None => report.pages.push(self.to_record(url, root_html, root_via, None)),
            Some(children) => {
                info!(library = %library, pages = children.len(), "discovered pages");
                if self.config.include_root {
                    report.pages.push(self.to_record(url, root_html, root_via, None));
                }
                let pages = self.fetch_children(&library, children).await;
                report.pages.extend(pages);
            }
        }

        if save_files {
            self.persist(&mut report).await;
        }

        info!(
            library = %library,
            ok = report.succeeded(),
            failed = report.failed(),
            "library done"
        );
        report
    }

    /// Fetch and convert children with bounded concurrency, in discovery order
    async fn fetch_children(&self, library: &str, children: Vec<NavEntry>) -> Vec<PageRecord> {
        let total = children.len();
        let pacer = Pacer::new(self.config.page_delay());
        let pacer = &pacer;

        let mut indexed: Vec<(usize, PageRecord)> = stream::iter(children.into_iter().enumerate())
            .map(|(i, entry)| async move {
                pacer.wait().await;
                info!(library, "processing {}/{}: {}", i + 1, total, entry.title);
                (i, self.fetch_entry(&entry).await)
            })
            .buffer_unordered(self.config.page_concurrency.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, record)| record).collect()
    }

    async fn fetch_entry(&self, entry: &NavEntry) -> PageRecord {
        let url = entry.url.as_str();
        match self.fetcher.fetch(url).await {
            FetchOutcome::Rendered { html, via } => self.to_record(url, html, via, Some(&entry.title)),
            FetchOutcome::Failure { reason, attempts } => {
                warn!(url, attempts, "failed to fetch page: {}", reason);
                let err = ScrapeError::FetchFailure {
                    url: url.to_string(),
                    reason,
                    attempts,
                };
                PageRecord::failed(url, String::new(), None, &err)
            }
        }
    }

    fn to_record(&self, url: &str, html: String, via: Via, nav_title: Option<&str>) -> PageRecord {
        let conversion = self
            .converter
            .convert_with_fallback_title(&html, Some(url), nav_title);
        if !conversion.success {
            let err = ScrapeError::ConversionFailure {
                url: url.to_string(),
                reason: conversion.reason.unwrap_or_else(|| "unknown".to_string()),
            };
            warn!(url, "{}", err);
            return PageRecord::failed(url, html, Some(via), &err);
        }
        PageRecord::converted(url, conversion.title, conversion.content, html, Some(via))
    }

    async fn persist(&self, report: &mut LibraryReport) {
        for page in report.pages.iter().filter(|p| p.success) {
            match self.writer.write(&report.library, page).await {
                Ok(path) => report.files.push(path),
                Err(e) => {
                    error!("{}", e);
                    report.errors.push(e);
                }
            }
        }
    }

    /// Scrape several libraries; one library's failure never stops the others.
    ///
    /// Keys are library names, suffixed `_2`, `_3`, ... on collision.
    pub async fn scrape_multiple_libraries(
        &self,
        urls: &[String],
        save_files: bool,
    ) -> BTreeMap<String, LibraryReport> {
        let limit = self.config.library_concurrency.max(1);
        let reports: Vec<(usize, LibraryReport)> = if limit == 1 {
            let mut out = Vec::with_capacity(urls.len());
            for (i, url) in urls.iter().enumerate() {
                out.push((i, self.scrape_library_report(url, save_files).await));
            }
            out
        } else {
            stream::iter(urls.iter().enumerate())
                .map(|(i, url)| async move {
                    let instance = self.fork();
                    let report = instance.scrape_library_report(url, save_files).await;
                    instance.close().await;
                    (i, report)
                })
                .buffer_unordered(limit)
                .collect()
                .await
        };

        let mut ordered = reports;
        ordered.sort_by_key(|(i, _)| *i);

        let mut results = BTreeMap::new();
        for (i, report) in ordered {
            let base = if report.library.is_empty() {
                format!("library_{}", i)
            } else {
                report.library.clone()
            };
            let mut key = base.clone();
            let mut n = 2;
            while results.contains_key(&key) {
                key = format!("{}_{}", base, n);
                n += 1;
            }
            results.insert(key, report);
        }
        results
    }

    /// Release the browser session. Idempotent.
    pub async fn close(&self) {
        self.fetcher.close().await;
    }
}

/// Spaces request starts at least `delay` apart, however many run at once
struct Pacer {
    delay: Duration,
    next: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            next: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        let start = {
            let mut next = self.next.lock().await;
            let now = Instant::now();
            let start = next.map_or(now, |n| n.max(now));
            *next = Some(start + self.delay);
            start
        };
        tokio::time::sleep_until(start).await;
    }
}
