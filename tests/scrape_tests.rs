//! Library scraping against a mock wiki site (HTTP path only)

use deepwiki2md::{DeepWikiScraper, HeadingStyle, RetryPolicy, ScrapeError, ScraperConfig, Via};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(out: &Path) -> ScraperConfig {
    ScraperConfig {
        output_dir: out.to_path_buf(),
        use_browser: false,
        site_domain: "127.0.0.1".to_string(),
        page_delay_ms: 0,
        timeout_ms: 5_000,
        retry: RetryPolicy {
            max_attempts: 1,
            backoff_ms: 1,
        },
        ..Default::default()
    }
}

fn root_page(links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{}\">{}</a></li>", href, text))
        .collect();
    format!(
        "<html><head><title>Library home</title></head><body>\
         <nav><ul>{}</ul></nav><main><h1>Library home</h1><p>Welcome.</p></main>\
         </body></html>",
        items
    )
}

fn leaf_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{t} | DeepWiki</title></head><body>\
         <header>Site header</header>\
         <main><h1>{t}</h1><p>{b}</p></main>\
         <footer>Site footer</footer></body></html>",
        t = title,
        b = body
    )
}

async fn serve(server: &MockServer, route: &str, body: String, delay_ms: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(server)
        .await;
}

/// Root at /o/lib linking three pages; the first responds slowest
async fn mock_library(server: &MockServer) {
    serve(
        server,
        "/o/lib",
        root_page(&[
            ("/o/lib/1-overview", "Overview"),
            ("/o/lib/2-setup", "Setup"),
            ("/o/lib/3-api", "API"),
            ("/o/lib/2-setup#install", "Setup again"),
            ("https://github.com/o/lib", "Source"),
        ]),
        0,
    )
    .await;
    serve(server, "/o/lib/1-overview", leaf_page("Overview", "What it is."), 300).await;
    serve(server, "/o/lib/2-setup", leaf_page("Setup", "How to install."), 0).await;
    serve(server, "/o/lib/3-api", leaf_page("API", "The calls."), 100).await;
}

#[tokio::test]
async fn test_library_in_navigation_order_and_files_written() {
    let server = MockServer::start().await;
    mock_library(&server).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(config(out.path())).unwrap();
    assert!(!scraper.has_browser());

    let root = format!("{}/o/lib", server.uri());
    let report = scraper.scrape_library_report(&root, true).await;
    scraper.close().await;

    let titles: Vec<_> = report.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Overview", "Setup", "API"]);
    assert!(report.pages.iter().all(|p| p.success && p.via == Some(Via::Fallback)));
    assert!(report.errors.is_empty());

    let overview = std::fs::read_to_string(out.path().join("lib").join("Overview.md")).unwrap();
    assert!(overview.starts_with("# Overview"));
    assert!(overview.contains("What it is."));
    assert!(!overview.contains("Site header"));
    assert!(!overview.contains("Site footer"));
    assert_eq!(report.files.len(), 3);
}

#[tokio::test]
async fn test_order_is_stable_under_page_concurrency() {
    let server = MockServer::start().await;
    mock_library(&server).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(ScraperConfig {
        page_concurrency: 3,
        ..config(out.path())
    })
    .unwrap();

    let root = format!("{}/o/lib", server.uri());
    let pages = scraper.scrape_library(&root, false).await;
    let urls: Vec<_> = pages.iter().map(|p| p.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/o/lib/1-overview", server.uri()),
            format!("{}/o/lib/2-setup", server.uri()),
            format!("{}/o/lib/3-api", server.uri()),
        ]
    );
    // save_files=false leaves the output directory untouched
    assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_include_root_and_setext_headings() {
    let server = MockServer::start().await;
    mock_library(&server).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(ScraperConfig {
        include_root: true,
        heading_style: HeadingStyle::Setext,
        ..config(out.path())
    })
    .unwrap();

    let root = format!("{}/o/lib", server.uri());
    let pages = scraper.scrape_library(&root, false).await;
    assert_eq!(pages.len(), 4);
    assert_eq!(pages[0].url, root);
    assert_eq!(pages[0].title, "Library home");
    assert!(pages[1].content.starts_with("Overview\n==="));
}

#[tokio::test]
async fn test_duplicate_titles_get_numbered_files() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/o/dup",
        root_page(&[("/o/dup/1-notes", "Notes"), ("/o/dup/2-notes", "Notes")]),
        0,
    )
    .await;
    serve(&server, "/o/dup/1-notes", leaf_page("Notes", "first"), 0).await;
    serve(&server, "/o/dup/2-notes", leaf_page("Notes", "second"), 0).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(config(out.path())).unwrap();
    let report = scraper
        .scrape_library_report(&format!("{}/o/dup", server.uri()), true)
        .await;

    let lib_dir = out.path().join("dup");
    assert_eq!(report.files, vec![lib_dir.join("Notes.md"), lib_dir.join("Notes_2.md")]);
    assert!(std::fs::read_to_string(lib_dir.join("Notes_2.md")).unwrap().contains("second"));
}

#[tokio::test]
async fn test_page_without_navigation_is_scraped_alone() {
    let server = MockServer::start().await;
    serve(&server, "/o/solo", leaf_page("Solo", "Just one page."), 0).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(config(out.path())).unwrap();
    let report = scraper
        .scrape_library_report(&format!("{}/o/solo", server.uri()), true)
        .await;

    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].title, "Solo");
    assert!(!report.navigation_found());
    assert!(!report.is_total_failure());
    assert!(out.path().join("solo").join("Solo.md").exists());
}

#[tokio::test]
async fn test_missing_child_page_recorded_as_failure() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/o/gaps",
        root_page(&[("/o/gaps/1-present", "Present"), ("/o/gaps/2-gone", "Gone")]),
        0,
    )
    .await;
    serve(&server, "/o/gaps/1-present", leaf_page("Present", "here"), 0).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(config(out.path())).unwrap();
    let report = scraper
        .scrape_library_report(&format!("{}/o/gaps", server.uri()), true)
        .await;

    assert_eq!(report.pages.len(), 2);
    assert!(report.pages[0].success);
    assert!(!report.pages[1].success);
    assert!(report.pages[1].content.is_empty());
    assert_eq!(report.pages[1].title, "2 gone");
    assert_eq!(report.files.len(), 1);
}

#[tokio::test]
async fn test_multiple_libraries_are_independent() {
    let server = MockServer::start().await;
    mock_library(&server).await;
    let out = tempdir().unwrap();

    let scraper = DeepWikiScraper::new(ScraperConfig {
        library_concurrency: 2,
        ..config(out.path())
    })
    .unwrap();

    let urls = vec![
        format!("{}/o/lib", server.uri()),
        format!("{}/o/missing", server.uri()),
        "https://deepwiki.com/o/elsewhere".to_string(),
    ];
    let results = scraper.scrape_multiple_libraries(&urls, true).await;
    scraper.close().await;

    assert_eq!(results.len(), 3);
    assert_eq!(results["lib"].succeeded(), 3);
    assert!(results["missing"].is_total_failure());
    assert!(matches!(results["missing"].errors[0], ScrapeError::FetchFailure { .. }));
    assert!(matches!(results["elsewhere"].errors[0], ScrapeError::UrlInvalid { .. }));
    assert!(out.path().join("lib").join("API.md").exists());
    assert!(!out.path().join("missing").exists());
}
