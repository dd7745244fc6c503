//! scrape command: fetch DeepWiki libraries into Markdown files
//!
//! Progress on stderr, compact JSON summary on stdout.

use crate::config::{HeadingStyle, ScraperConfig};
use crate::extract::extract_library_urls;
use crate::orchestrator::DeepWikiScraper;
use crate::schema::{LibraryReport, LibrarySummary, RunSummary};
use crate::wiki_url::DeepWikiUrl;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::{self, BufRead};
use std::path::PathBuf;
use tokio::fs;

#[derive(Args)]
pub struct ScrapeArgs {
    /// Library URLs, e.g. https://deepwiki.com/owner/library
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// Markdown or text file to take library URLs from
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Read URLs from stdin (one per line)
    #[arg(long)]
    stdin: bool,

    /// Output directory [default: output]
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Run the browser with a visible window
    #[arg(long)]
    show_browser: bool,

    /// Skip the browser and fetch over plain HTTP
    #[arg(long)]
    no_browser: bool,

    /// YAML config file; flags override its values
    #[arg(long, value_name = "YAML")]
    config: Option<PathBuf>,

    /// Heading style of the generated Markdown
    #[arg(long, value_enum)]
    heading_style: Option<HeadingStyle>,

    /// Keep navigation, header, and footer regions in the output
    #[arg(long)]
    keep_navigation: bool,

    /// Also convert the library root page
    #[arg(long)]
    include_root: bool,

    /// Libraries scraped at once (1-8)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=8))]
    concurrency: Option<u8>,

    /// Pages fetched at once within a library (1-8)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
    page_concurrency: Option<u8>,

    /// Timeout per page in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries per fetch path after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Site domain URLs must belong to [default: deepwiki.com]
    #[arg(long)]
    domain: Option<String>,

    /// Validate and list the libraries without fetching anything
    #[arg(long)]
    dry_run: bool,
}

/// One line of `--dry-run` output
#[derive(Debug, Serialize)]
pub struct PlannedLibrary {
    pub url: String,
    pub library: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Run the scrape command
pub async fn run_scrape(args: ScrapeArgs) -> Result<()> {
    let config = build_config(&args)?;
    let urls = get_urls(&args, &config.site_domain).await?;

    if urls.is_empty() {
        eprintln!("No URLs found.");
        std::process::exit(1);
    }

    if args.dry_run {
        let plan = plan(&urls, &config.site_domain);
        println!("{}", serde_json::to_string(&plan)?);
        let valid = plan.iter().filter(|p| p.valid).count();
        eprintln!("Dry run: {}/{} valid library URLs", valid, plan.len());
        if valid == 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let scraper = DeepWikiScraper::new(config).context("Invalid configuration")?;
    let config = scraper.config();

    eprintln!(
        "Scraping {} libraries ({} parallel, {} pages at a time) into {}",
        urls.len(),
        config.library_concurrency,
        config.page_concurrency,
        config.output_dir.display()
    );
    if !scraper.has_browser() {
        eprintln!("  Browser unavailable or disabled, using HTTP fetches");
    }

    let started = Utc::now();
    let results = tokio::select! {
        results = scraper.scrape_multiple_libraries(&urls, true) => results,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, closing browser...");
            scraper.close().await;
            std::process::exit(130);
        }
    };
    scraper.close().await;

    for (key, report) in &results {
        eprintln!(
            "  -> {}: {}/{} pages, {} files",
            key,
            report.succeeded(),
            report.pages.len(),
            report.files.len()
        );
    }

    let summary = summarize(&results, started, &config.output_dir);
    println!("{}", serde_json::to_string(&summary)?);

    eprintln!("Done: {}/{} libraries OK", summary.ok, summary.ok + summary.failed);

    if summary.ok == 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Defaults, then the YAML file, then flags
fn build_config(args: &ScrapeArgs) -> Result<ScraperConfig> {
    let mut config = match &args.config {
        Some(path) => ScraperConfig::from_yaml_file(path)?,
        None => ScraperConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.show_browser {
        config.headless = false;
    }
    if args.no_browser {
        config.use_browser = false;
    }
    if let Some(style) = args.heading_style {
        config.heading_style = style;
    }
    if args.keep_navigation {
        config.strip_navigation = false;
    }
    if args.include_root {
        config.include_root = true;
    }
    if let Some(n) = args.concurrency {
        config.library_concurrency = n as usize;
    }
    if let Some(n) = args.page_concurrency {
        config.page_concurrency = n as usize;
    }
    if let Some(ms) = args.timeout {
        config.timeout_ms = ms;
    }
    if let Some(retries) = args.retries {
        config.retry.max_attempts = retries.saturating_add(1);
    }
    if let Some(domain) = &args.domain {
        config.site_domain = domain.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Positional URLs, then --file, then --stdin; duplicates dropped
async fn get_urls(args: &ScrapeArgs, domain: &str) -> Result<Vec<String>> {
    if args.urls.is_empty() && args.file.is_none() && !args.stdin {
        eprintln!("Usage:");
        eprintln!("  deepwiki2md scrape <URL>...        Scrape one or more libraries");
        eprintln!("  deepwiki2md scrape --file <FILE>   Scrape library URLs found in a file");
        eprintln!("  deepwiki2md scrape --stdin         Read URLs from stdin");
        std::process::exit(1);
    }

    let mut urls = args.urls.clone();

    if let Some(file) = &args.file {
        let content = fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
        urls.extend(extract_library_urls(&content, domain));
    }

    if args.stdin {
        let stdin = io::stdin();
        urls.extend(
            stdin
                .lock()
                .lines()
                .map_while(Result::ok)
                .map(|line| line.trim().to_string())
                .filter(|line| line.starts_with("http")),
        );
    }

    let mut seen = HashSet::new();
    urls.retain(|u| seen.insert(u.trim().trim_end_matches('/').to_string()));
    Ok(urls)
}

fn plan(urls: &[String], domain: &str) -> Vec<PlannedLibrary> {
    urls.iter()
        .map(|raw| {
            let url = DeepWikiUrl::parse_for_domain(raw, domain);
            PlannedLibrary {
                url: raw.clone(),
                library: url.library_name().to_string(),
                valid: url.is_valid(),
                reason: url.invalid_reason().map(str::to_string),
            }
        })
        .collect()
}

/// A library counts as OK unless it produced no successful page at all
fn summarize(
    results: &BTreeMap<String, LibraryReport>,
    started: chrono::DateTime<Utc>,
    output_dir: &std::path::Path,
) -> RunSummary {
    let libraries: Vec<LibrarySummary> = results.values().map(LibrarySummary::from).collect();
    let failed = results.values().filter(|r| r.is_total_failure()).count();
    RunSummary {
        started,
        finished: Utc::now(),
        output_dir: output_dir.display().to_string(),
        ok: libraries.len() - failed,
        failed,
        libraries,
    }
}
