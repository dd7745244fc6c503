//! Library URL extraction from markdown and text content

use crate::wiki_url::DeepWikiUrl;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s\)>\]"'`<]+"#).expect("static regex"));

/// Extract unique URLs from text content, in order of first appearance
pub fn extract_urls(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for mat in URL_RE.find_iter(content) {
        let url = mat
            .as_str()
            .trim_end_matches(|c| matches!(c, ',' | '.' | ')' | ']' | ';' | ':'));

        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    urls
}

/// Extract URLs that are valid library URLs on `domain`, deduped by page
pub fn extract_library_urls(content: &str, domain: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_urls(content)
        .into_iter()
        .filter(|raw| {
            let parsed = DeepWikiUrl::parse_for_domain(raw, domain);
            parsed.is_valid() && seen.insert(parsed.normalized())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_urls() {
        let content = r#"
            Check out https://example.com and
            [link](https://foo.bar/path?q=1) for more.
            Also http://old.site.org.
        "#;

        let urls = extract_urls(content);
        assert_eq!(
            urls,
            vec!["https://example.com", "https://foo.bar/path?q=1", "http://old.site.org"]
        );
    }

    #[test]
    fn test_extract_urls_dedup() {
        let content = "https://dup.com https://dup.com https://dup.com";
        assert_eq!(extract_urls(content).len(), 1);
    }

    #[test]
    fn test_extract_library_urls_filters_other_sites() {
        let content = "\
            - [Amalgam](https://deepwiki.com/tweag/amalgam)\n\
            - https://github.com/tweag/amalgam\n\
            - https://deepwiki.com/tweag\n\
            - <https://deepwiki.com/rust-lang/rust/2-compiler>\n\
            - https://deepwiki.com/tweag/amalgam/ (again)\n";

        let urls = extract_library_urls(content, "deepwiki.com");
        assert_eq!(
            urls,
            vec![
                "https://deepwiki.com/tweag/amalgam",
                "https://deepwiki.com/rust-lang/rust/2-compiler",
            ]
        );
    }

    #[test]
    fn test_extract_library_urls_custom_domain() {
        let content = "http://127.0.0.1:8080/o/lib and https://deepwiki.com/o/lib";
        let urls = extract_library_urls(content, "127.0.0.1");
        assert_eq!(urls, vec!["http://127.0.0.1:8080/o/lib"]);
    }
}
