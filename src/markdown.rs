//! HTML to Markdown conversion for wiki pages
//!
//! Boilerplate regions are detached from the parsed DOM, the main content
//! region is handed to html2md, and the result is rewritten to the
//! configured heading style and normalized.

use crate::config::{HeadingStyle, ScraperConfig};
use crate::wiki_url::DeepWikiUrl;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Always removed, even without navigation stripping
const ALWAYS_STRIP: &[&str] = &["script", "style", "noscript"];

const NAVIGATION_SELECTORS: &[&str] = &[
    "ul.flex-1.flex-shrink-0.space-y-1.overflow-y-auto.py-1",
    "nav",
    "header",
    "footer",
    "aside",
    ".navigation",
    ".sidebar",
    ".menu",
    ".breadcrumb",
    ".breadcrumbs",
    "[aria-label*=\"breadcrumb\"]",
];

const CONTENT_SELECTORS: &[&str] = &[
    "main article",
    "main .content",
    "main",
    "article",
    ".content",
    ".article-content",
    "#content",
    ".markdown-body",
    ".documentation-content",
    ".page-content",
    "[role=\"main\"]",
];

const TITLE_SELECTORS: &[&str] = &["h1", ".page-title", ".article-title"];

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)]*)\)").expect("valid link regex"));

/// Output of converting one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub title: String,
    pub content: String,
    pub success: bool,
    /// Why conversion produced nothing
    #[serde(skip)]
    pub reason: Option<String>,
}

impl Conversion {
    fn failed(title: String, reason: &str) -> Self {
        Self {
            title,
            content: String::new(),
            success: false,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    heading_style: HeadingStyle,
    strip_navigation: bool,
    strip_link_urls: bool,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new(HeadingStyle::Atx, true)
    }
}

impl MarkdownConverter {
    pub fn new(heading_style: HeadingStyle, strip_navigation: bool) -> Self {
        Self {
            heading_style,
            strip_navigation,
            strip_link_urls: false,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.heading_style, config.strip_navigation)
            .with_link_stripping(config.strip_link_urls)
    }

    /// Keep link text, drop link targets
    pub fn with_link_stripping(mut self, strip: bool) -> Self {
        self.strip_link_urls = strip;
        self
    }

    /// Convert a full page. Never panics; failures come back unsuccessful.
    pub fn convert_page(&self, html: &str, url: Option<&str>) -> Conversion {
        self.convert_with_fallback_title(html, url, None)
    }

    /// Like [`convert_page`](Self::convert_page), but a page without its own
    /// title takes `fallback_title` before the URL-derived one
    pub fn convert_with_fallback_title(
        &self,
        html: &str,
        url: Option<&str>,
        fallback_title: Option<&str>,
    ) -> Conversion {
        let fallback = match fallback_title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => url
                .map(|u| DeepWikiUrl::parse(u).title_hint())
                .unwrap_or_default(),
        };

        if html.trim().is_empty() {
            return Conversion::failed(fallback, "empty document");
        }

        let mut doc = Html::parse_document(html);
        let title = extract_title(&doc).unwrap_or(fallback);

        strip_regions(&mut doc, ALWAYS_STRIP);
        if self.strip_navigation {
            strip_regions(&mut doc, NAVIGATION_SELECTORS);
            strip_source_file_blocks(&mut doc);
        }

        let Some(main_html) = main_content(&doc) else {
            warn!(url = url.unwrap_or(""), "no main content found");
            return Conversion::failed(title, "no main content found");
        };

        let markdown = match catch_unwind(AssertUnwindSafe(|| html2md::parse_html(&main_html))) {
            Ok(md) => md,
            Err(_) => return Conversion::failed(title, "html2md panicked"),
        };

        let content = self.finish(&markdown);
        if content.is_empty() {
            return Conversion::failed(title, "converted content is empty");
        }

        Conversion {
            title,
            content,
            success: true,
            reason: None,
        }
    }

    /// Heading style, optional link stripping, whitespace normalization
    pub fn finish(&self, markdown: &str) -> String {
        let styled = match self.heading_style {
            HeadingStyle::Atx => setext_to_atx(markdown),
            HeadingStyle::Setext => atx_to_setext(markdown),
        };
        let linked = if self.strip_link_urls {
            strip_links(&styled)
        } else {
            styled
        };
        normalize_markdown(&linked)
    }
}

fn select_text(doc: &Html, sel: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .next()
        .map(|el| collapse(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn select_attr(doc: &Html, sel: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `<title>` (site suffixes after ` | ` dropped), then og:title, then headings
fn extract_title(doc: &Html) -> Option<String> {
    let from_meta = select_text(doc, "title")
        .or_else(|| select_attr(doc, "meta[property='og:title']", "content"))
        .and_then(|t| t.split(" | ").next().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty());
    from_meta.or_else(|| TITLE_SELECTORS.iter().find_map(|sel| select_text(doc, sel)))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_regions(doc: &mut Html, selectors: &[&str]) {
    let mut ids = Vec::new();
    for sel in selectors {
        if let Ok(selector) = Selector::parse(sel) {
            ids.extend(doc.select(&selector).map(|el| el.id()));
        }
    }
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// DeepWiki's collapsible "Relevant source files" lists
fn strip_source_file_blocks(doc: &mut Html) {
    let Ok(selector) = Selector::parse("details") else {
        return;
    };
    let ids: Vec<_> = doc
        .select(&selector)
        .filter(|el| {
            collapse(&el.text().collect::<String>())
                .to_lowercase()
                .starts_with("relevant source files")
        })
        .map(|el| el.id())
        .collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn has_text(el: &ElementRef) -> bool {
    el.text().any(|t| !t.trim().is_empty())
}

fn main_content(doc: &Html) -> Option<String> {
    for sel in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).find(has_text) {
            debug!(selector = sel, "main content region");
            return Some(el.html());
        }
    }

    let divs = Selector::parse("div").ok()?;
    let largest = doc
        .select(&divs)
        .max_by_key(|el| el.text().map(|t| t.trim().len()).sum::<usize>())
        .filter(has_text);
    if let Some(el) = largest {
        return Some(el.html());
    }

    let body = Selector::parse("body").ok()?;
    doc.select(&body).find(has_text).map(|el| el.html())
}

fn is_underline(line: &str, marker: char) -> bool {
    let t = line.trim();
    t.len() >= 2 && t.chars().all(|c| c == marker)
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// `Title\n=====` -> `# Title`, `Title\n-----` -> `## Title`
fn setext_to_atx(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_fence = false;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let next = lines.get(i + 1).copied();
        let heading_text = !in_fence && !line.trim().is_empty() && !line.trim_start().starts_with('#');
        match next {
            Some(n) if heading_text && is_underline(n, '=') => {
                out.push(format!("# {}", line.trim()));
                i += 2;
            }
            Some(n) if heading_text && is_underline(n, '-') && !is_list_item(line) => {
                out.push(format!("## {}", line.trim()));
                i += 2;
            }
            _ => {
                out.push(line.to_string());
                i += 1;
            }
        }
    }
    out.join("\n")
}

/// `# Title` -> `Title\n=====`, `## Title` -> `Title\n-----`; deeper levels stay ATX
fn atx_to_setext(markdown: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in markdown.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let (level, text) = if in_fence { (0, "") } else { atx_heading(line) };
        match level {
            1 | 2 => {
                let marker = if level == 1 { "=" } else { "-" };
                out.push(text.to_string());
                out.push(marker.repeat(text.chars().count().max(3)));
            }
            _ => out.push(line.to_string()),
        }
    }
    out.join("\n")
}

fn atx_heading(line: &str) -> (usize, &str) {
    let t = line.trim_start();
    let level = t.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return (0, "");
    }
    let rest = &t[level..];
    if !rest.starts_with(' ') {
        return (0, "");
    }
    let text = rest.trim().trim_end_matches('#').trim_end();
    if text.is_empty() {
        return (0, "");
    }
    (level, text)
}

fn is_list_item(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("* ") || t.starts_with("- ") || t.starts_with("+ ")
}

/// `[text](url)` -> `text`; images are left alone
fn strip_links(markdown: &str) -> String {
    LINK_RE
        .replace_all(markdown, |caps: &regex::Captures| {
            if &caps[1] == "!" {
                caps[0].to_string()
            } else {
                caps[2].to_string()
            }
        })
        .into_owned()
}

/// Trim line ends, collapse blank-line runs, drop outer blank lines
pub fn normalize_markdown(markdown: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut prev_empty = true;
    for line in markdown.lines() {
        let line = line.trim_end();
        let empty = line.is_empty();
        if empty && prev_empty {
            continue;
        }
        out.push(line);
        prev_empty = empty;
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
