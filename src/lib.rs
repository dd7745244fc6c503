//! deepwiki2md: DeepWiki libraries to Markdown files
//!
//! Pages are rendered with headless Chrome (plain HTTP when no browser is
//! available), the library's page set is discovered from the navigation
//! sidebar, and each page is converted and written to
//! `<output_dir>/<library>/<title>.md`.

pub mod browser;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod markdown;
pub mod navigation;
pub mod orchestrator;
pub mod schema;
pub mod scrape;
pub mod wiki_url;
pub mod writer;

pub use config::{HeadingStyle, RetryPolicy, ScraperConfig};
pub use error::{Result, ScrapeError};
pub use fetch::{HttpSource, PageFetcher, PageSource};
pub use markdown::{Conversion, MarkdownConverter};
pub use navigation::{discover, NavEntry, NavigationGraph};
pub use orchestrator::DeepWikiScraper;
pub use schema::{LibraryReport, PageRecord, RunSummary, Via};
pub use wiki_url::DeepWikiUrl;
pub use writer::FileWriter;
