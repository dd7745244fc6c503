//! Library page discovery from the rendered navigation sidebar

use crate::error::{Result, ScrapeError};
use crate::wiki_url::DeepWikiUrl;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Candidate navigation containers, most specific first.
/// The first is DeepWiki's sidebar page tree.
const NAV_SELECTORS: &[&str] = &[
    "ul.flex-1.flex-shrink-0.space-y-1.overflow-y-auto.py-1",
    "nav ul",
    ".navigation ul",
    ".sidebar ul",
    "aside ul",
    ".menu ul",
    "ul[class*=\"nav\"]",
    "ul[class*=\"menu\"]",
];

/// A page linked from the navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub url: DeepWikiUrl,
    /// Link text, used when the page itself has no title
    pub title: String,
}

/// Ordered, duplicate-free set of a library's pages
#[derive(Debug, Clone)]
pub struct NavigationGraph {
    pub root: DeepWikiUrl,
    children: Vec<NavEntry>,
    seen: HashSet<String>,
}

impl NavigationGraph {
    pub fn new(root: DeepWikiUrl) -> Self {
        // a root opened with a query still matches plain links back to it
        let mut seen = HashSet::new();
        seen.insert(root.normalized());
        seen.insert(root.normalized_path());
        Self {
            root,
            children: Vec::new(),
            seen,
        }
    }

    /// Append unless already present (or the root); returns whether added
    pub fn push(&mut self, entry: NavEntry) -> bool {
        if !self.seen.insert(entry.url.normalized()) {
            return false;
        }
        self.children.push(entry);
        true
    }

    pub fn children(&self) -> &[NavEntry] {
        &self.children
    }

    pub fn into_children(self) -> Vec<NavEntry> {
        self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Extract the library's pages, in navigation order, from the root page.
///
/// Returns `NavigationNotFound` when no navigation container with links
/// exists. A container whose links all leave the library yields an empty
/// graph instead.
pub fn discover(root_html: &str, root_url: &DeepWikiUrl) -> Result<NavigationGraph> {
    let doc = Html::parse_document(root_html);
    let link_sel = Selector::parse("a[href]").expect("static selector");
    let base = root_url.url().ok_or_else(|| ScrapeError::NavigationNotFound {
        url: root_url.to_string(),
    })?;
    let domain = root_url.domain().to_string();

    for sel in NAV_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        let Some(container) = doc
            .select(&selector)
            .find(|el| el.select(&link_sel).next().is_some())
        else {
            continue;
        };
        debug!(selector = sel, "navigation region found");

        let mut graph = NavigationGraph::new(root_url.clone());
        for link in container.select(&link_sel) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Ok(resolved) = base.join(href.trim()) else {
                continue;
            };
            let candidate = DeepWikiUrl::parse_for_domain(resolved.as_str(), &domain);
            if !root_url.is_in_library(&candidate) {
                continue;
            }
            let title = link
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            graph.push(NavEntry {
                url: candidate,
                title,
            });
        }
        return Ok(graph);
    }

    Err(ScrapeError::NavigationNotFound {
        url: root_url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> DeepWikiUrl {
        DeepWikiUrl::parse("https://deepwiki.com/o/lib")
    }

    fn urls(graph: &NavigationGraph) -> Vec<&str> {
        graph.children().iter().map(|e| e.url.as_str()).collect()
    }

    #[test]
    fn test_discover_dedupes_in_order() {
        let html = r#"
            <html><body>
              <nav><ul>
                <li><a href="/o/lib/1-a">A</a></li>
                <li><a href="/o/lib/2-b">B</a></li>
                <li><a href="/o/lib/3-c">C</a></li>
                <li><a href="/o/lib/2-b/">B again</a></li>
              </ul></nav>
              <main><p>body</p></main>
            </body></html>
        "#;
        let graph = discover(html, &root()).unwrap();
        assert_eq!(
            urls(&graph),
            vec![
                "https://deepwiki.com/o/lib/1-a",
                "https://deepwiki.com/o/lib/2-b",
                "https://deepwiki.com/o/lib/3-c",
            ]
        );
        assert_eq!(graph.children()[1].title, "B");
    }

    #[test]
    fn test_discover_keeps_navigation_order_not_alphabetical() {
        let html = r#"<nav><ul>
            <li><a href="/o/lib/9-zeta">Zeta</a></li>
            <li><a href="/o/lib/1-alpha">Alpha</a></li>
        </ul></nav>"#;
        let graph = discover(html, &root()).unwrap();
        assert_eq!(graph.children()[0].title, "Zeta");
        assert_eq!(graph.children()[1].title, "Alpha");
    }

    #[test]
    fn test_discover_filters_foreign_links_fragments_and_root() {
        let html = r#"<div class="sidebar"><ul>
            <li><a href="https://deepwiki.com/o/lib">Home</a></li>
            <li><a href="https://github.com/o/lib">GitHub</a></li>
            <li><a href="/o/other/1-x">Other lib</a></li>
            <li><a href="/o/lib/1-intro#setup">Intro</a></li>
            <li><a href="/o/lib/1-intro">Intro dup</a></li>
            <li><a href="mailto:someone@example.com">Mail</a></li>
        </ul></div>"#;
        let graph = discover(html, &root()).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.children()[0].title, "Intro");
    }

    #[test]
    fn test_deepwiki_sidebar_preferred_over_generic_nav() {
        let html = r#"
            <nav><ul><li><a href="/o/lib/99-header-link">Header</a></li></ul></nav>
            <ul class="flex-1 flex-shrink-0 space-y-1 overflow-y-auto py-1">
              <li><a href="/o/lib/1-overview">Overview</a></li>
              <li><a href="/o/lib/2-architecture">Architecture</a></li>
            </ul>"#;
        let graph = discover(html, &root()).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.children()[0].title, "Overview");
    }

    #[test]
    fn test_no_navigation_region() {
        let html = "<html><body><main><h1>Only</h1><a href='/o/lib/1-x'>x</a></main></body></html>";
        let err = discover(html, &root()).unwrap_err();
        assert!(matches!(err, ScrapeError::NavigationNotFound { .. }));
    }

    #[test]
    fn test_navigation_without_library_links_is_empty() {
        let html = r#"<nav><ul><li><a href="https://example.com/">Elsewhere</a></li></ul></nav>"#;
        let graph = discover(html, &root()).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_root_with_query_is_not_a_child() {
        let root = DeepWikiUrl::parse("https://deepwiki.com/o/lib?tab=1");
        let html = r#"<nav><ul>
            <li><a href="/o/lib">Home</a></li>
            <li><a href="/o/lib/1-a">A</a></li>
        </ul></nav>"#;
        let graph = discover(html, &root).unwrap();
        assert_eq!(urls(&graph), vec!["https://deepwiki.com/o/lib/1-a"]);
    }

    #[test]
    fn test_graph_rejects_root_and_duplicates() {
        let mut graph = NavigationGraph::new(root());
        let entry = |u: &str| NavEntry {
            url: DeepWikiUrl::parse(u),
            title: String::new(),
        };
        assert!(!graph.push(entry("https://deepwiki.com/o/lib/")));
        assert!(graph.push(entry("https://deepwiki.com/o/lib/1-a")));
        assert!(!graph.push(entry("https://deepwiki.com/o/lib/1-a#x")));
        assert_eq!(graph.len(), 1);
    }
}
